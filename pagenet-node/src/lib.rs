mod error;
mod extension;
mod node;
mod rpc;
mod statistics;
mod view;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;

use chitchat::transport::Transport;
use chitchat::FailureDetectorConfig;
use datacake_rpc::{RpcService, Server};
pub use error::NodeError;
pub use extension::NodeExtension;
use futures::StreamExt;
pub use node::{GossipNode, NodeMembership};
pub use rpc::network::RpcNetwork;
pub use statistics::ClusterStatistics;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::info;
pub use view::{ClusterMember, ClusterView};

use crate::rpc::gossip_transport::GossipTransport;
use crate::rpc::services::gossip_impl::GossipService;

pub static DEFAULT_CLUSTER_ID: &str = "pagenet-cluster-unknown";

/// Build a pagenet node using provided settings.
pub struct PagenetNodeBuilder {
    node_name: String,
    connection_cfg: ConnectionConfig,
    cluster_id: String,
}

impl PagenetNodeBuilder {
    /// Create a new node builder.
    pub fn new(node_name: impl Into<String>, connection_cfg: ConnectionConfig) -> Self {
        Self {
            node_name: node_name.into(),
            connection_cfg,
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
        }
    }

    /// Set the cluster id for the given node.
    pub fn with_cluster_id(mut self, cluster_id: impl Display) -> Self {
        self.cluster_id = cluster_id.to_string();
        self
    }

    /// Starts the node, connecting to the targeted seed nodes.
    ///
    /// When connecting to the cluster, the `node_name` **must be unique**
    /// otherwise the cluster will incorrectly track membership.
    ///
    /// No seed nodes need to be live at the time of connecting for the cluster
    /// to start correctly, but they are required in order for nodes to
    /// discover one-another. A node started without any seed nodes considers
    /// itself the founder of a brand-new cluster.
    pub async fn connect(self) -> Result<PagenetNode, NodeError> {
        let statistics = ClusterStatistics::default();
        let network = RpcNetwork::default();

        let rpc_server = Server::listen(self.connection_cfg.listen_addr).await?;

        let (gossip_tx, gossip_rx) = flume::bounded(1000);
        rpc_server.add_service(GossipService::new(gossip_tx));

        let transport = GossipTransport::new(
            self.connection_cfg.public_addr,
            network.clone(),
            gossip_rx,
        );

        let me = ClusterMember::new(self.node_name.clone(), self.connection_cfg.public_addr);
        let seed_nodes = self.connection_cfg.seed_nodes.clone();
        let node = GossipNode::connect(
            me.clone(),
            self.connection_cfg.listen_addr,
            self.cluster_id.clone(),
            seed_nodes.clone(),
            FailureDetectorConfig::default(),
            &transport,
            statistics.clone(),
        )
        .await?;

        let (view_tx, view) = watch::channel(ClusterView::new(me.clone()));
        let (changes_tx, membership_changes) = watch::channel(MembershipChange::default());
        tokio::spawn(watch_membership_changes(
            me,
            network.clone(),
            node.member_change_watcher(),
            view_tx,
            changes_tx,
        ));

        info!(
            node_name = %self.node_name,
            cluster_id = %self.cluster_id,
            listen_addr = %self.connection_cfg.listen_addr,
            "Pagenet node connected."
        );

        Ok(PagenetNode {
            rpc_server,
            node,
            network,
            seed_nodes,
            view,
            membership_changes,
            // Needs to live to run the gossip network.
            _transport: Box::new(transport),
        })
    }
}

#[derive(Debug, Clone)]
/// Configuration for the cluster network.
pub struct ConnectionConfig {
    /// The binding address for the RPC server to bind and listen on.
    ///
    /// This is often `0.0.0.0` + your chosen port.
    pub listen_addr: SocketAddr,

    /// The public address to be broadcast to other cluster members.
    ///
    /// This is normally the machine's public IP address and the port the server is listening on.
    pub public_addr: SocketAddr,

    /// A set of initial seed nodes which the node will attempt to connect to and learn of any
    /// other members in the cluster.
    ///
    /// Normally `2` or `3` seeds is fine when running a multi-node cluster.
    /// An empty seed list means the node is forming a brand-new cluster.
    pub seed_nodes: Vec<String>,
}

impl ConnectionConfig {
    /// Creates a new connection config.
    pub fn new(
        listen_addr: SocketAddr,
        public_addr: SocketAddr,
        seeds: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            listen_addr,
            public_addr,
            seed_nodes: seeds
                .into_iter()
                .map(|seed| seed.as_ref().to_string())
                .collect(),
        }
    }
}

pub struct PagenetNode {
    node: GossipNode,
    rpc_server: Server,
    network: RpcNetwork,
    seed_nodes: Vec<String>,
    view: watch::Receiver<ClusterView>,
    membership_changes: watch::Receiver<MembershipChange>,
    _transport: Box<dyn Transport>,
}

impl PagenetNode {
    /// Shuts down the node and cleans up any connections.
    pub async fn shutdown(self) {
        self.node.shutdown().await;
        self.rpc_server.shutdown();
    }

    /// Add a RPC service to the existing RPC system.
    pub fn add_rpc_service<Svc>(&self, service: Svc)
    where
        Svc: RpcService + Send + Sync + 'static,
    {
        self.rpc_server.add_service(service);
    }

    /// Initialises a node extension, providing it access to the membership
    /// and RPC systems of the node.
    pub async fn add_extension<Ext>(&self, ext: Ext) -> Result<Ext::Output, Ext::Error>
    where
        Ext: NodeExtension,
    {
        ext.init_extension(self).await
    }

    #[inline]
    /// Gets the live cluster statistics.
    pub fn statistics(&self) -> ClusterStatistics {
        self.node.statistics()
    }

    #[inline]
    /// Get access to the current RPC network.
    pub fn network(&self) -> &RpcNetwork {
        &self.network
    }

    #[inline]
    /// Return the cluster member of the node itself.
    pub fn me(&self) -> &ClusterMember {
        self.node.me()
    }

    #[inline]
    /// The seed nodes this node was configured with.
    pub fn seed_nodes(&self) -> &[String] {
        &self.seed_nodes
    }

    #[inline]
    /// A snapshot of the current cluster view.
    pub fn cluster_view(&self) -> ClusterView {
        self.view.borrow().clone()
    }

    #[inline]
    /// Returns a handle to the view watcher channel.
    pub fn view_watcher(&self) -> watch::Receiver<ClusterView> {
        self.view.clone()
    }

    #[inline]
    /// Get a stream of membership changes.
    pub fn membership_changes(&self) -> WatchStream<MembershipChange> {
        WatchStream::new(self.membership_changes.clone())
    }

    /// Convenience method for testing that waits for the predicate to hold
    /// true for the cluster's view.
    pub async fn wait_for_members<F>(
        &self,
        mut predicate: F,
        timeout_after: Duration,
    ) -> Result<(), anyhow::Error>
    where
        F: FnMut(&ClusterView) -> bool,
    {
        use tokio::time::timeout;

        let mut view = self.view.clone();
        timeout(timeout_after, async move {
            loop {
                if predicate(&view.borrow()) {
                    return;
                }

                if view.changed().await.is_err() {
                    return;
                }
            }
        })
        .await?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MembershipChange {
    pub joined: Vec<ClusterMember>,
    pub left: Vec<ClusterMember>,
}

/// Watches for changes in the cluster membership.
///
/// Replaces the published view wholesale on every change and disconnects
/// pooled RPC channels of members which are no longer part of the cluster.
async fn watch_membership_changes(
    me: ClusterMember,
    network: RpcNetwork,
    mut changes: WatchStream<NodeMembership>,
    view_tx: watch::Sender<ClusterView>,
    membership_changes_tx: watch::Sender<MembershipChange>,
) {
    let mut last_network_set = BTreeSet::new();
    while let Some(members) = changes.next().await {
        info!(
            self_node = %me.name,
            num_members = members.len(),
            "Cluster membership has changed."
        );

        let mut membership_changes = MembershipChange::default();
        let new_network_set = members
            .values()
            .filter(|member| member.name != me.name)
            .map(|member| (member.name.clone(), member.public_addr))
            .collect::<BTreeSet<_>>();

        // Remove clients no longer apart of the network.
        for (name, addr) in last_network_set.difference(&new_network_set) {
            info!(
                self_node = %me.name,
                target_node = %name,
                target_addr = %addr,
                "Node is no longer part of cluster."
            );

            network.disconnect(*addr);
            membership_changes
                .left
                .push(ClusterMember::new(name.clone(), *addr));
        }

        // Register each newly joined node.
        for (name, addr) in new_network_set.difference(&last_network_set) {
            info!(
                self_node = %me.name,
                target_node = %name,
                target_addr = %addr,
                "Node has connected to the cluster."
            );

            if let Some(member) = members.get(name) {
                membership_changes.joined.push(member.clone());
            }
        }

        let _ = view_tx.send(ClusterView::from_members(
            me.clone(),
            members.into_values(),
        ));
        let _ = membership_changes_tx.send(membership_changes);
        last_network_set = new_network_set;
    }
}
