use std::net::SocketAddr;
use std::path::PathBuf;

use pagenet_cluster::{
    CoreConfig,
    Node,
    NodeStatus,
    Operation,
    OperationError,
    QuorumPolicy,
    ReplicatedCoreExtension,
    StateHandle,
    User,
};
use pagenet_node::{ConnectionConfig, PagenetNodeBuilder};

#[tokio::test]
async fn test_rejoin_updates_existing_record() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let snapshot_path = snapshot_file("rejoin");
    let stale_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
    seed_snapshot(&snapshot_path, "restart-node", stale_addr);

    let addr = test_helper::get_unused_addr();
    let connection_cfg = ConnectionConfig::new(addr, addr, Vec::<String>::new());
    let node = PagenetNodeBuilder::new("restart-node", connection_cfg)
        .connect()
        .await?;

    let core = node
        .add_extension(ReplicatedCoreExtension::new(CoreConfig {
            snapshot_path: Some(snapshot_path.clone()),
            quorum_policy: QuorumPolicy::Majority,
        }))
        .await
        .expect("Create replicated core.");
    let handle = core.handle();

    // Rejoin must not create additional records.
    assert_eq!(handle.users().len(), 1);
    assert_eq!(handle.nodes().len(), 1);

    // Only the address and status of the existing record are refreshed.
    let record = handle
        .get_node("restart-node")
        .expect("Node record should survive the restart.");
    assert_eq!(record.address, addr);
    assert_eq!(record.status, NodeStatus::Online);
    assert_eq!(record.version, "7", "Version counters must be preserved.");

    node.shutdown().await;
    let _ = std::fs::remove_file(&snapshot_path);
    Ok(())
}

#[tokio::test]
async fn test_no_quorum_rejects_writes() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let snapshot_path = snapshot_file("quorum");
    let stale_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
    seed_snapshot(&snapshot_path, "gated-node", stale_addr);

    let addr = test_helper::get_unused_addr();
    let connection_cfg = ConnectionConfig::new(addr, addr, Vec::<String>::new());
    let node = PagenetNodeBuilder::new("gated-node", connection_cfg)
        .connect()
        .await?;

    // A minimum of two reachable members can never be met by a single node.
    let core = node
        .add_extension(ReplicatedCoreExtension::new(CoreConfig {
            snapshot_path: Some(snapshot_path.clone()),
            quorum_policy: QuorumPolicy::AtLeast(2),
        }))
        .await
        .expect("Rejoin does not submit gated writes.");
    let handle = core.handle();

    assert!(!handle.is_quorum());

    let res = handle
        .put_user(Some(User::new(
            "alice",
            "some-hash",
            "alice@example.com",
            false,
        )))
        .await;
    assert!(matches!(res, Err(OperationError::NoQuorum)));
    assert_eq!(handle.users().len(), 1, "No partial application.");

    // Calls are not quorum gated and keep flowing.
    handle
        .submit_call(Some(pagenet_cluster::Call::new("admin", "still paging")))
        .await
        .expect("Submit call.");
    assert_eq!(handle.calls().len(), 1);

    node.shutdown().await;
    let _ = std::fs::remove_file(&snapshot_path);
    Ok(())
}

fn snapshot_file(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "pagenet-{tag}-test-{}.json",
        std::process::id()
    ))
}

/// Writes a snapshot resembling a previously bootstrapped single-node
/// cluster: one admin user and one node record with a stale address.
fn seed_snapshot(path: &PathBuf, node_name: &str, stale_addr: SocketAddr) {
    let _ = std::fs::remove_file(path);

    let state = StateHandle::new(Some(path.clone()));
    state.with_write(|state| {
        state.apply(&Operation::PutUser(User::new(
            "admin",
            pagenet_cluster::auth::hash_password("admin"),
            "admin@example.com",
            true,
        )));

        let mut record = Node::new(node_name, stale_addr, "7", "3", NodeStatus::Offline);
        record.owner_names = vec!["admin".to_string()];
        state.apply(&Operation::PutNode(record));
    });
    state.persist().expect("Write seed snapshot.");
}
