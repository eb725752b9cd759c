use datacake_rpc::{Handler, Request, RpcService, ServiceRegistry, Status};
use rkyv::{Archive, Deserialize, Serialize};

use crate::state::{StateHandle, StateSnapshot};

#[repr(C)]
#[derive(Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
pub struct PullState;

/// Serves the full replicated state to newly connecting members.
pub struct TransferService {
    state: StateHandle,
}

impl TransferService {
    pub fn new(state: StateHandle) -> Self {
        Self { state }
    }
}

impl RpcService for TransferService {
    fn register_handlers(registry: &mut ServiceRegistry<Self>) {
        registry.add_handler::<PullState>();
    }
}

#[datacake_rpc::async_trait]
impl Handler<PullState> for TransferService {
    type Reply = StateSnapshot;

    async fn on_message(&self, msg: Request<PullState>) -> Result<Self::Reply, Status> {
        let snapshot = self.state.with_read(|state| state.to_snapshot());

        info!(
            remote_addr = %msg.remote_addr(),
            num_users = snapshot.users.len(),
            num_nodes = snapshot.nodes.len(),
            num_calls = snapshot.calls.len(),
            "Serving state transfer."
        );

        Ok(snapshot)
    }
}
