use std::io;
use std::net::SocketAddr;

use datacake_rpc::Status;
use thiserror::Error;

use crate::model::ConstraintViolation;

#[derive(Debug, Error)]
/// The ways a submitted state operation can be rejected or fail.
///
/// Everything except [OperationError::OperationFailed] is raised before any
/// network interaction takes place, a rejected operation leaves the state of
/// every member untouched.
pub enum OperationError {
    #[error("not enough reachable members to safely apply the write")]
    /// The quorum gate rejected the write.
    ///
    /// The caller must not blindly retry, the condition only clears once
    /// enough members become reachable again.
    NoQuorum,

    #[error("the request payload is missing or empty")]
    /// The operand was absent or empty where one is required.
    EmptyInput,

    #[error("validation failed with {} constraint violation(s)", .0.len())]
    /// The operand violated structural constraints, nothing was replicated.
    Validation(Vec<ConstraintViolation>),

    #[error("no entity named `{0}` exists")]
    /// The deletion target does not resolve to an existing entity.
    NotFound(String),

    #[error("failed to apply the operation on member {addr}: {status}")]
    /// The broadcast invocation failed after passing all local checks.
    OperationFailed { addr: SocketAddr, status: Status },
}

#[derive(Debug, Error)]
/// Failures while establishing a consistent baseline state on connect.
///
/// Every variant is fatal: a node without a bootstrapped baseline cannot
/// operate safely and the embedding process is expected to shut down.
pub enum BootstrapError {
    #[error("state transfer from the cluster failed: {0}")]
    StateTransfer(String),

    #[error("could not create the genesis admin user: {0}")]
    GenesisUser(#[source] OperationError),

    #[error("could not create the genesis node record: {0}")]
    GenesisNode(#[source] OperationError),
}

impl BootstrapError {
    /// Whether the error requires an orderly process shutdown.
    ///
    /// There is no safe degraded mode for a node without a baseline state,
    /// so this currently holds for every variant.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

#[derive(Debug, Error)]
/// Failures while reading or writing the durable state snapshot.
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
/// Failures while initialising the replicated core extension.
pub enum CoreError {
    #[error("cluster bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("failed to load the state snapshot: {0}")]
    Persistence(#[from] PersistenceError),
}
