use std::net::SocketAddr;

use chitchat::serialize::Serializable;
use chitchat::ChitchatMessage;
use datacake_rpc::{Handler, Request, RpcService, ServiceRegistry, Status};
use rkyv::{Archive, Deserialize, Serialize};

#[repr(C)]
#[derive(Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
pub struct GossipRpcMessage {
    pub data: Vec<u8>,
    pub source: SocketAddr,
}

/// Receives gossip traffic from peers and forwards it to the local
/// chitchat instance.
pub struct GossipService {
    messages: flume::Sender<(SocketAddr, ChitchatMessage)>,
}

impl GossipService {
    pub fn new(messages: flume::Sender<(SocketAddr, ChitchatMessage)>) -> Self {
        Self { messages }
    }
}

impl RpcService for GossipService {
    fn register_handlers(registry: &mut ServiceRegistry<Self>) {
        registry.add_handler::<GossipRpcMessage>();
    }
}

#[datacake_rpc::async_trait]
impl Handler<GossipRpcMessage> for GossipService {
    type Reply = ();

    async fn on_message(&self, request: Request<GossipRpcMessage>) -> Result<Self::Reply, Status> {
        let msg = request.to_owned().map_err(Status::internal)?;

        let from = msg.source;
        let mut buffer = msg.data.as_slice();
        let msg = <ChitchatMessage as Serializable>::deserialize(&mut buffer)
            .map_err(|e| Status::internal(e.to_string()))?;

        // The gossip layer re-sends state on its own cadence, dropping a
        // message when the buffer is full is safe.
        let _ = self.messages.try_send((from, msg));

        Ok(())
    }
}
