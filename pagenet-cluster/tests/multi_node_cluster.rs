use std::time::Duration;

use pagenet_cluster::{CoreConfig, ReplicatedCore, ReplicatedCoreExtension, User};
use pagenet_node::{ConnectionConfig, PagenetNode, PagenetNodeBuilder};

#[tokio::test]
async fn test_join_by_state_transfer() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let node_1_addr = test_helper::get_unused_addr();
    let node_2_addr = test_helper::get_unused_addr();

    // Node 1 founds the cluster.
    let (node_1, core_1) = create_node("node-1", node_1_addr, Vec::new()).await;
    let handle_1 = core_1.handle();
    assert_eq!(handle_1.users().len(), 1, "Genesis user should exist.");

    // Node 2 joins and pulls the full state from node 1.
    let (node_2, core_2) =
        create_node("node-2", node_2_addr, vec![node_1_addr.to_string()]).await;
    let handle_2 = core_2.handle();

    let admin = handle_2
        .get_user("admin")
        .expect("Transferred state should contain the genesis user.");
    assert!(admin.admin);
    assert!(
        handle_2.get_node("node-1").is_some(),
        "Transferred state should contain the founder's node record."
    );

    node_1
        .wait_for_members(|view| view.len() == 2, Duration::from_secs(30))
        .await
        .expect("Nodes should see each other within timeout.");

    // A write submitted on node 1 lands on node 2 as part of the broadcast.
    handle_1
        .put_user(Some(User::new(
            "carol",
            pagenet_cluster::auth::hash_password("secret"),
            "carol@example.com",
            false,
        )))
        .await
        .expect("Put user with two reachable members.");

    let replicated = handle_2
        .get_user("carol")
        .expect("The write should be applied on the peer.");
    assert_eq!(replicated.mail, "carol@example.com");

    // Deletions follow the same path.
    handle_2.delete_user("carol").await.expect("Delete user.");
    assert!(handle_1.get_user("carol").is_none());
    assert!(handle_2.get_user("carol").is_none());

    node_2.shutdown().await;
    node_1.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_replicas_converge() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let node_1_addr = test_helper::get_unused_addr();
    let node_2_addr = test_helper::get_unused_addr();

    let (node_1, core_1) = create_node("conv-1", node_1_addr, Vec::new()).await;
    let (node_2, core_2) =
        create_node("conv-2", node_2_addr, vec![node_1_addr.to_string()]).await;

    node_1
        .wait_for_members(|view| view.len() == 2, Duration::from_secs(30))
        .await
        .expect("Nodes should see each other within timeout.");

    let handle_1 = core_1.handle();
    let handle_2 = core_2.handle();

    // Interleave writes from both sides.
    for i in 0..5u32 {
        let handle = if i % 2 == 0 { &handle_1 } else { &handle_2 };
        handle
            .put_user(Some(User::new(
                format!("user-{i}"),
                "some-hash",
                format!("user-{i}@example.com"),
                false,
            )))
            .await
            .expect("Put user.");
    }

    let state_1 = handle_1.state().with_read(|state| state.clone());
    let state_2 = handle_2.state().with_read(|state| state.clone());
    assert_eq!(state_1, state_2, "Replicas must converge on equal state.");

    node_2.shutdown().await;
    node_1.shutdown().await;
    Ok(())
}

async fn create_node(
    name: &str,
    addr: std::net::SocketAddr,
    seeds: Vec<String>,
) -> (PagenetNode, ReplicatedCore) {
    let connection_cfg = ConnectionConfig::new(addr, addr, seeds);
    let node = PagenetNodeBuilder::new(name, connection_cfg)
        .connect()
        .await
        .expect("Connect node.");

    let core = node
        .add_extension(ReplicatedCoreExtension::new(CoreConfig::default()))
        .await
        .expect("Create replicated core.");

    (node, core)
}
