//! Cluster bootstrap: the one-time setup performed when a node connects.
//!
//! Three outcomes exist per connect: forming a brand-new cluster (genesis),
//! restarting a previously bootstrapped single-node cluster (rejoin), or
//! joining an existing cluster by state transfer. Any unrecoverable step
//! surfaces as a fatal [BootstrapError] and the embedding process is
//! expected to shut down, a node must not operate without a consistent
//! baseline state.

use pagenet_node::{ClusterMember, PagenetNode};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::dispatch::OperationDispatcher;
use crate::error::BootstrapError;
use crate::model::{normalize_name, Node, NodeStatus, User};
use crate::ops::Operation;
use crate::rpc::TransferClient;
use crate::state::{ReplicatedState, StateHandle};

pub(crate) async fn run_bootstrap(
    node: &PagenetNode,
    state: &StateHandle,
    dispatcher: &OperationDispatcher,
) -> Result<(), BootstrapError> {
    // A node configured without seeds is alone and therefore forming a
    // brand-new cluster; a view-size probe at this point would race the
    // gossip exchange.
    if !node.seed_nodes().is_empty() {
        return join_existing_cluster(node, state).await;
    }

    warn!(
        "Creating new cluster: check the seed node configuration and restart \
         in case you want to join an existing one."
    );

    let local_name = normalize_name(&node.me().name);

    // Decide under the write lock without mutating, then release the lock
    // before submitting anything: the dispatcher takes the lock itself and
    // must never find it already held.
    let (need_user, need_node) = state.with_write(|state| {
        let need_user = state.users().is_empty();
        let need_node = state.get_node(&local_name).is_none();
        (need_user, need_node)
    });

    if need_user {
        create_first_user(dispatcher).await?;
    }

    if need_node {
        create_first_node(node.me(), dispatcher).await?;
    } else {
        update_first_node(node.me(), state);
    }

    Ok(())
}

/// Requests the full replicated state from the first reachable peer and
/// installs it wholesale.
///
/// This blocks until the membership layer reports a peer, deliberately
/// without an artificial timeout: proceeding with a partial or default state
/// would be worse than not starting at all.
async fn join_existing_cluster(
    node: &PagenetNode,
    state: &StateHandle,
) -> Result<(), BootstrapError> {
    info!("Joining existing cluster, waiting for a reachable member to transfer state from.");

    let peer = wait_for_first_peer(node).await?;

    let channel = node
        .network()
        .get_or_connect(peer.public_addr)
        .map_err(|e| BootstrapError::StateTransfer(e.to_string()))?;

    let mut client = TransferClient::new(channel);
    let snapshot = client
        .pull_state()
        .await
        .map_err(|e| BootstrapError::StateTransfer(e.to_string()))?;

    state.install(ReplicatedState::from_snapshot(snapshot));
    state.persist_best_effort();

    info!(from = %peer.name, "State transfer complete.");

    // Marking this node `Online` in the shared state is left to the regular
    // liveness announcement path which every node performs once connected;
    // announcing here as well would race it.
    Ok(())
}

async fn wait_for_first_peer(node: &PagenetNode) -> Result<ClusterMember, BootstrapError> {
    let mut views = WatchStream::new(node.view_watcher());
    while let Some(view) = views.next().await {
        if let Some(peer) = view.peers().next() {
            return Ok(peer.clone());
        }
    }

    Err(BootstrapError::StateTransfer(
        "the membership watcher closed before a peer became reachable".to_string(),
    ))
}

async fn create_first_user(dispatcher: &OperationDispatcher) -> Result<(), BootstrapError> {
    info!("Creating first user.");

    let user = User::genesis();
    dispatcher
        .submit(Some(Operation::PutUser(user)), true)
        .await
        .map_err(BootstrapError::GenesisUser)?;

    info!("First user successfully created.");
    Ok(())
}

async fn create_first_node(
    me: &ClusterMember,
    dispatcher: &OperationDispatcher,
) -> Result<(), BootstrapError> {
    info!("Creating first node.");

    let record = Node::genesis(me.name.clone(), me.public_addr);
    dispatcher
        .submit(Some(Operation::PutNode(record)), true)
        .await
        .map_err(BootstrapError::GenesisNode)?;

    info!("First node successfully created.");
    Ok(())
}

/// A restart of a previously bootstrapped single-node cluster: refresh the
/// existing record directly, there is no one to broadcast to.
fn update_first_node(me: &ClusterMember, state: &StateHandle) {
    let local_name = normalize_name(&me.name);
    state.with_write(|state| {
        if let Some(record) = state.get_node_mut(&local_name) {
            record.address = me.public_addr;
            record.status = NodeStatus::Online;
        }
    });

    // A failed snapshot write is survivable here, the in-memory state is
    // correct and will be persisted again on the next write.
    state.persist_best_effort();

    info!("First node successfully updated.");
}
