use datacake_rpc::{Handler, Request, RpcService, ServiceRegistry, Status};
use rkyv::{Archive, Deserialize, Serialize};

use crate::ops::Operation;
use crate::state::StateHandle;

#[repr(C)]
#[derive(Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
pub struct ApplyOperation {
    pub op: Operation,
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct Applied {
    pub changed: bool,
}

/// Applies operations broadcast by other cluster members against the local
/// replicated state.
///
/// Operations arriving here were already validated and admitted by the
/// originating member, application itself is deterministic.
pub struct OperationsService {
    state: StateHandle,
}

impl OperationsService {
    pub fn new(state: StateHandle) -> Self {
        Self { state }
    }
}

impl RpcService for OperationsService {
    fn register_handlers(registry: &mut ServiceRegistry<Self>) {
        registry.add_handler::<ApplyOperation>();
    }
}

#[datacake_rpc::async_trait]
impl Handler<ApplyOperation> for OperationsService {
    type Reply = Applied;

    async fn on_message(&self, msg: Request<ApplyOperation>) -> Result<Self::Reply, Status> {
        let payload = msg.to_owned().map_err(Status::internal)?;

        let changed = self.state.with_write(|state| state.apply(&payload.op));
        self.state.persist_best_effort();

        debug!(
            op = payload.op.name(),
            changed,
            remote_addr = %msg.remote_addr(),
            "Applied replicated operation."
        );

        Ok(Applied { changed })
    }
}
