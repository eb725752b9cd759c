use pagenet_cluster::{
    Call,
    CoreConfig,
    NodeStatus,
    OperationError,
    ReplicatedCore,
    ReplicatedCoreExtension,
    User,
};
use pagenet_node::{ConnectionConfig, PagenetNode, PagenetNodeBuilder};

#[tokio::test]
async fn test_genesis_bootstrap() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (node, core) = create_node("genesis-node", CoreConfig::default()).await;
    let handle = core.handle();

    // Exactly one admin user must exist after genesis.
    let users = handle.users();
    assert_eq!(users.len(), 1);
    let admin = handle.get_user("admin").expect("Admin user should exist.");
    assert_eq!(admin.name, "admin");
    assert!(admin.admin, "The genesis user must be an administrator.");
    assert_ne!(admin.hash, "admin", "The password must be stored hashed.");

    // Exactly one node record keyed by the local member name.
    let nodes = handle.nodes();
    assert_eq!(nodes.len(), 1);
    let record = handle
        .get_node("genesis-node")
        .expect("Genesis node record should exist.");
    assert_eq!(record.status, NodeStatus::Online);
    assert_eq!(record.address, node.me().public_addr);
    assert_eq!(record.version, "0");
    assert_eq!(record.config_version, "0");
    assert_eq!(record.owner_names, vec!["admin".to_string()]);

    // No calls are created during bootstrap.
    assert!(handle.calls().is_empty());

    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_submit_and_read_calls() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (node, core) = create_node("call-node", CoreConfig::default()).await;
    let handle = core.handle();

    handle
        .submit_call(Some(Call::new("admin", "first page")))
        .await
        .expect("Submit call.");
    handle
        .submit_call(Some(Call::new("admin", "second page")))
        .await
        .expect("Submit call.");

    let calls = handle.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.timestamp_ms > 0));

    let owned = handle.calls_for_owner("ADMIN");
    assert_eq!(owned.len(), 2);
    assert!(handle.calls_for_owner("nobody").is_empty());

    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_operations_leave_state_unchanged() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (node, core) = create_node("reject-node", CoreConfig::default()).await;
    let handle = core.handle();

    // Missing payloads are rejected before anything else happens.
    let res = handle.put_user(None).await;
    assert!(matches!(res, Err(OperationError::EmptyInput)));

    let res = handle.submit_call(None).await;
    assert!(matches!(res, Err(OperationError::EmptyInput)));

    // Deleting an unknown entity reports the unresolved identity.
    let res = handle.delete_user("ghost").await;
    assert!(matches!(res, Err(OperationError::NotFound(name)) if name == "ghost"));

    // Structurally invalid payloads never reach the state.
    let res = handle
        .put_user(Some(User::new("bad name!", "", "not-a-mail", false)))
        .await;
    assert!(matches!(res, Err(OperationError::Validation(_))));

    assert_eq!(handle.users().len(), 1, "Only the genesis user may exist.");
    assert_eq!(handle.nodes().len(), 1);
    assert!(handle.calls().is_empty());

    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_user_lifecycle() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let (node, core) = create_node("lifecycle-node", CoreConfig::default()).await;
    let handle = core.handle();

    let user = User::new(
        "Alice",
        pagenet_cluster::auth::hash_password("wonderland"),
        "alice@example.com",
        false,
    );
    handle.put_user(Some(user)).await.expect("Put user.");

    let stored = handle.get_user("alice").expect("User should exist.");
    assert!(pagenet_cluster::auth::verify_password(
        "wonderland",
        &stored.hash
    ));

    handle.delete_user("ALICE").await.expect("Delete user.");
    assert!(handle.get_user("alice").is_none());

    node.shutdown().await;
    Ok(())
}

async fn create_node(name: &str, config: CoreConfig) -> (PagenetNode, ReplicatedCore) {
    let addr = test_helper::get_unused_addr();
    let connection_cfg = ConnectionConfig::new(addr, addr, Vec::<String>::new());
    let node = PagenetNodeBuilder::new(name, connection_cfg)
        .connect()
        .await
        .expect("Connect node.");

    let core = node
        .add_extension(ReplicatedCoreExtension::new(config))
        .await
        .expect("Create replicated core.");

    (node, core)
}
