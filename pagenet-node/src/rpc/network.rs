use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use datacake_rpc::Channel;
use parking_lot::RwLock;
use tracing::trace;

#[derive(Clone, Default)]
/// A pool of RPC channels to other cluster members.
///
/// Channels are multiplexed and cheap to clone, one channel per member
/// address is kept and reused until the member leaves the cluster.
pub struct RpcNetwork {
    channels: Arc<RwLock<HashMap<SocketAddr, Channel>>>,
}

impl RpcNetwork {
    /// Returns the pooled channel for the address, establishing a new
    /// connection if none exists yet.
    pub fn get_or_connect(&self, addr: SocketAddr) -> io::Result<Channel> {
        {
            let guard = self.channels.read();
            if let Some(channel) = guard.get(&addr) {
                return Ok(channel.clone());
            }
        }

        trace!(addr = %addr, "Establishing new channel to member.");
        let channel = Channel::connect(addr);
        self.channels.write().insert(addr, channel.clone());

        Ok(channel)
    }

    /// Drops the pooled channel of a member which left the cluster.
    pub fn disconnect(&self, addr: SocketAddr) {
        if self.channels.write().remove(&addr).is_some() {
            trace!(addr = %addr, "Dropped channel of departed member.");
        }
    }

    /// The number of members the pool currently holds channels for.
    pub fn num_connected(&self) -> usize {
        self.channels.read().len()
    }
}
