use std::io;
use std::io::ErrorKind;
use std::net::SocketAddr;

use async_trait::async_trait;
use chitchat::serialize::Serializable;
use chitchat::transport::{Socket, Transport};
use chitchat::ChitchatMessage;
use datacake_rpc::RpcClient;
use tracing::trace;

use crate::rpc::network::RpcNetwork;
use crate::rpc::services::gossip_impl::{GossipRpcMessage, GossipService};

#[derive(Clone)]
/// Chitchat compatible transport built on top of the existing RPC connections.
///
/// This allows us to maintain a single listen address and connection pool
/// rather than both a UDP and TCP connection per peer.
pub struct GossipTransport {
    public_addr: SocketAddr,
    network: RpcNetwork,
    messages: flume::Receiver<(SocketAddr, ChitchatMessage)>,
}

impl GossipTransport {
    pub fn new(
        public_addr: SocketAddr,
        network: RpcNetwork,
        messages: flume::Receiver<(SocketAddr, ChitchatMessage)>,
    ) -> Self {
        Self {
            public_addr,
            network,
            messages,
        }
    }
}

#[async_trait]
impl Transport for GossipTransport {
    async fn open(&self, _listen_addr: SocketAddr) -> Result<Box<dyn Socket>, anyhow::Error> {
        Ok(Box::new(GossipConnection {
            self_addr: self.public_addr,
            network: self.network.clone(),
            messages: self.messages.clone(),
        }))
    }
}

pub struct GossipConnection {
    self_addr: SocketAddr,
    network: RpcNetwork,
    messages: flume::Receiver<(SocketAddr, ChitchatMessage)>,
}

#[async_trait]
impl Socket for GossipConnection {
    async fn send(&mut self, to: SocketAddr, msg: ChitchatMessage) -> Result<(), anyhow::Error> {
        trace!(to = %to, msg = ?msg, "Gossip send");
        let data = msg.serialize_to_vec();

        let channel = self
            .network
            .get_or_connect(to)
            .map_err(|e| io::Error::new(ErrorKind::ConnectionRefused, e.to_string()))?;

        let mut client = RpcClient::<GossipService>::new(channel);
        client
            .send(&GossipRpcMessage {
                data,
                source: self.self_addr,
            })
            .await
            .map_err(|e| io::Error::new(ErrorKind::ConnectionAborted, e.to_string()))?;

        Ok(())
    }

    async fn recv(&mut self) -> Result<(SocketAddr, ChitchatMessage), anyhow::Error> {
        let msg = self.messages.recv_async().await?;
        Ok(msg)
    }
}
