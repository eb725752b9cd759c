use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chitchat::transport::Transport;
use chitchat::{spawn_chitchat, ChitchatConfig, ChitchatHandle, FailureDetectorConfig, NodeId};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::error::NodeError;
use crate::statistics::ClusterStatistics;
use crate::view::ClusterMember;

const GOSSIP_INTERVAL: Duration = if cfg!(test) {
    Duration::from_millis(500)
} else {
    Duration::from_secs(1)
};

pub type NodeMembership = BTreeMap<String, ClusterMember>;

/// The gossip backed membership handle of a single cluster node.
///
/// The node maintains a watch channel containing the set of members the
/// failure detector currently believes to be alive, itself included.
pub struct GossipNode {
    me: ClusterMember,
    statistics: ClusterStatistics,
    chitchat_handle: ChitchatHandle,
    members: watch::Receiver<NodeMembership>,
    stop: Arc<AtomicBool>,
}

impl GossipNode {
    pub async fn connect(
        me: ClusterMember,
        listen_addr: SocketAddr,
        cluster_id: String,
        seed_nodes: Vec<String>,
        failure_detector_config: FailureDetectorConfig,
        transport: &dyn Transport,
        statistics: ClusterStatistics,
    ) -> Result<Self, NodeError> {
        info!(
            cluster_id = %cluster_id,
            node_name = %me.name,
            public_addr = %me.public_addr,
            listen_gossip_addr = %listen_addr,
            peer_seed_addrs = %seed_nodes.join(", "),
            "Joining cluster."
        );

        statistics.num_live_members.store(1, Ordering::Relaxed);

        let cfg = ChitchatConfig {
            node_id: NodeId::new(me.name.clone(), me.public_addr),
            cluster_id,
            gossip_interval: GOSSIP_INTERVAL,
            listen_addr,
            seed_nodes,
            failure_detector_config,
            is_ready_predicate: None,
        };

        let chitchat_handle = spawn_chitchat(cfg, Vec::new(), transport)
            .await
            .map_err(|e| NodeError::ChitChat(e.to_string()))?;

        let chitchat = chitchat_handle.chitchat();
        let (members_tx, members_rx) = watch::channel(BTreeMap::new());

        let node = GossipNode {
            me: me.clone(),
            chitchat_handle,
            statistics: statistics.clone(),
            members: members_rx,
            stop: Arc::new(Default::default()),
        };

        let initial_members = NodeMembership::from_iter([(me.name.clone(), me.clone())]);
        if members_tx.send(initial_members).is_err() {
            error!("Failed to add itself as the initial member of the cluster.");
        }

        let stop_flag = node.stop.clone();
        tokio::spawn(async move {
            let mut node_change_rx = chitchat.lock().await.ready_nodes_watcher();

            while let Some(members_set) = node_change_rx.next().await {
                {
                    let lock = chitchat.lock().await;
                    let dead_member_count = lock.dead_nodes().count();
                    statistics
                        .num_dead_members
                        .store(dead_member_count as u64, Ordering::Relaxed);
                }

                let mut members = members_set
                    .into_iter()
                    .map(|node_id| {
                        let member = ClusterMember::new(
                            node_id.id.clone(),
                            node_id.gossip_public_address,
                        );
                        (member.name.clone(), member)
                    })
                    .collect::<NodeMembership>();
                members.insert(me.name.clone(), me.clone());

                statistics
                    .num_live_members
                    .store(members.len() as u64, Ordering::Relaxed);

                if stop_flag.load(Ordering::Relaxed) {
                    debug!("Received a stop signal. Stopping.");
                    break;
                }

                if members_tx.send(members).is_err() {
                    // Somehow the node has been dropped.
                    error!("Failed to update members list. Stopping.");
                    break;
                }
            }
        });

        Ok(node)
    }

    #[inline]
    /// The member this process runs as.
    pub fn me(&self) -> &ClusterMember {
        &self.me
    }

    /// Return [WatchStream] for monitoring change of node members.
    pub fn member_change_watcher(&self) -> WatchStream<NodeMembership> {
        WatchStream::new(self.members.clone())
    }

    /// Returns a handle to the members watcher channel.
    pub fn members_watcher(&self) -> watch::Receiver<NodeMembership> {
        self.members.clone()
    }

    #[inline]
    /// Get a handle to the live statistics.
    pub fn statistics(&self) -> ClusterStatistics {
        self.statistics.clone()
    }

    /// Leave the cluster.
    pub async fn shutdown(self) {
        info!(self_addr = ?self.me.public_addr, "Shutting down the cluster.");
        let result = self.chitchat_handle.shutdown().await;
        if let Err(error) = result {
            error!(self_addr = ?self.me.public_addr, error = ?error, "Error while shutting down.");
        }

        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use chitchat::transport::ChannelTransport;

    use super::*;

    #[tokio::test]
    async fn test_single_node_membership() -> Result<(), anyhow::Error> {
        let _ = tracing_subscriber::fmt::try_init();

        let transport = ChannelTransport::default();
        let addr: SocketAddr = ([127, 0, 0, 1], 7801).into();
        let me = ClusterMember::new("test-node", addr);

        let node = GossipNode::connect(
            me.clone(),
            addr,
            "test-cluster".to_string(),
            Vec::new(),
            FailureDetectorConfig::default(),
            &transport,
            ClusterStatistics::default(),
        )
        .await?;

        let members = node.members_watcher().borrow().clone();
        assert_eq!(members.len(), 1);
        assert!(members.contains_key("test-node"));
        assert_eq!(node.me(), &me);
        assert_eq!(node.statistics().num_live_members(), 1);

        node.shutdown().await;
        Ok(())
    }
}
