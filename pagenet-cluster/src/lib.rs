//! # Pagenet Cluster
//! The quorum gated, replicated state engine of a pagenet cluster.
//!
//! Every node of the cluster owns a full copy of one mutable application
//! state (operator users, transmitter node records and paging calls). State
//! operations may be submitted against any node; they are validated and
//! quorum checked locally, then applied on every reachable member so all
//! replicas converge on identical state.
//!
//! The engine runs as an extension on top of a [pagenet_node::PagenetNode]
//! which provides membership, failure detection and the RPC fabric:
//!
//! ```rust,no_run
//! use pagenet_cluster::{CoreConfig, ReplicatedCoreExtension};
//! use pagenet_node::{ConnectionConfig, PagenetNodeBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let addr = "127.0.0.1:8000".parse()?;
//!     let connection_cfg = ConnectionConfig::new(addr, addr, Vec::<String>::new());
//!     let node = PagenetNodeBuilder::new("node-1", connection_cfg)
//!         .connect()
//!         .await?;
//!
//!     let core = node
//!         .add_extension(ReplicatedCoreExtension::new(CoreConfig::default()))
//!         .await?;
//!
//!     let handle = core.handle();
//!     let users = handle.users();
//!     println!("known users: {}", users.len());
//!     Ok(())
//! }
//! ```
//!
//! A node started without seed nodes bootstraps a brand-new cluster: it
//! creates the genesis `admin` user and its own transmitter node record.
//! A node started with seed nodes joins an existing cluster by pulling a
//! full state transfer from the first reachable member.

#[macro_use]
extern crate tracing;

pub mod auth;
mod bootstrap;
mod dispatch;
mod error;
mod model;
mod ops;
mod quorum;
mod rpc;
mod state;

use std::path::PathBuf;

use async_trait::async_trait;
pub use dispatch::OperationDispatcher;
pub use error::{BootstrapError, CoreError, OperationError, PersistenceError};
pub use model::{
    normalize_name,
    Call,
    ConstraintViolation,
    NamedEntity,
    Node,
    NodeStatus,
    User,
    Validate,
};
pub use ops::{EntityKind, Operation};
use pagenet_node::{NodeExtension, PagenetNode};
pub use quorum::{QuorumGate, QuorumPolicy};
pub use rpc::{OperationsClient, OperationsService, TransferClient, TransferService};
pub use state::{ReplicatedState, StateHandle, StateSnapshot};

#[derive(Debug, Clone, Default)]
/// Configuration of the replicated core.
pub struct CoreConfig {
    /// Where the durable state snapshot lives.
    ///
    /// `None` keeps the state purely in memory, which is mostly useful for
    /// tests.
    pub snapshot_path: Option<PathBuf>,

    /// The quorum requirement applied to gated writes.
    pub quorum_policy: QuorumPolicy,
}

/// Initialises the replicated state core on top of a connected node.
///
/// Initialisation performs the cluster bootstrap (genesis, rejoin or state
/// transfer join) before the core is handed back; a returned error is fatal
/// and the embedding process should shut down.
pub struct ReplicatedCoreExtension {
    config: CoreConfig,
}

impl ReplicatedCoreExtension {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeExtension for ReplicatedCoreExtension {
    type Output = ReplicatedCore;
    type Error = CoreError;

    async fn init_extension(self, node: &PagenetNode) -> Result<Self::Output, Self::Error> {
        let state = StateHandle::new(self.config.snapshot_path.clone());
        if state.load_from_disk()? {
            info!("Loaded state snapshot from disk.");
        }

        let gate = QuorumGate::new(
            node.view_watcher(),
            state.clone(),
            self.config.quorum_policy,
        );
        let dispatcher = OperationDispatcher::new(
            state.clone(),
            node.network().clone(),
            node.view_watcher(),
            gate.clone(),
        );

        node.add_rpc_service(OperationsService::new(state.clone()));
        node.add_rpc_service(TransferService::new(state.clone()));

        bootstrap::run_bootstrap(node, &state, &dispatcher).await?;

        Ok(ReplicatedCore {
            state,
            gate,
            dispatcher,
        })
    }
}

/// The fully initialised replicated state core of a cluster node.
pub struct ReplicatedCore {
    state: StateHandle,
    gate: QuorumGate,
    dispatcher: OperationDispatcher,
}

impl ReplicatedCore {
    /// Creates a cheaply cloneable handle for submitting operations and
    /// reading state.
    pub fn handle(&self) -> ReplicatedCoreHandle {
        ReplicatedCoreHandle {
            state: self.state.clone(),
            gate: self.gate.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

#[derive(Clone)]
/// A handle used by upstream request layers to query and mutate the
/// replicated state.
pub struct ReplicatedCoreHandle {
    state: StateHandle,
    gate: QuorumGate,
    dispatcher: OperationDispatcher,
}

impl ReplicatedCoreHandle {
    #[inline]
    /// Whether enough members are reachable to admit gated writes.
    pub fn is_quorum(&self) -> bool {
        self.gate.is_quorum()
    }

    #[inline]
    /// Access to the raw dispatcher, for callers which build their own
    /// [Operation] values.
    pub fn dispatcher(&self) -> &OperationDispatcher {
        &self.dispatcher
    }

    #[inline]
    /// Scoped read access to the underlying state.
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Creates or replaces an operator account on every reachable member.
    pub async fn put_user(&self, user: Option<User>) -> Result<(), OperationError> {
        self.dispatcher
            .submit(user.map(Operation::PutUser), true)
            .await
    }

    /// Deletes an operator account by name on every reachable member.
    pub async fn delete_user(&self, name: &str) -> Result<(), OperationError> {
        self.dispatcher
            .submit(Some(Operation::DeleteUser(name.to_string())), true)
            .await
    }

    /// Creates or replaces a transmitter node record on every reachable member.
    pub async fn put_node(&self, node: Option<Node>) -> Result<(), OperationError> {
        self.dispatcher
            .submit(node.map(Operation::PutNode), true)
            .await
    }

    /// Deletes a transmitter node record by name on every reachable member.
    pub async fn delete_node(&self, name: &str) -> Result<(), OperationError> {
        self.dispatcher
            .submit(Some(Operation::DeleteNode(name.to_string())), true)
            .await
    }

    /// Submits a paging call.
    ///
    /// Calls are ephemeral traffic and are deliberately not quorum gated: a
    /// partitioned node keeps accepting pages for the transmitters it can
    /// still reach.
    pub async fn submit_call(&self, call: Option<Call>) -> Result<(), OperationError> {
        self.dispatcher
            .submit(call.map(Operation::PutCall), false)
            .await
    }

    pub fn get_user(&self, name: &str) -> Option<User> {
        self.state.with_read(|state| state.get_user(name).cloned())
    }

    pub fn users(&self) -> Vec<User> {
        self.state
            .with_read(|state| state.users().values().cloned().collect())
    }

    pub fn get_node(&self, name: &str) -> Option<Node> {
        self.state.with_read(|state| state.get_node(name).cloned())
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.state
            .with_read(|state| state.nodes().values().cloned().collect())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.with_read(|state| state.calls().to_vec())
    }

    pub fn calls_for_owner(&self, owner_name: &str) -> Vec<Call> {
        self.state
            .with_read(|state| state.calls_for_owner(owner_name))
    }
}
