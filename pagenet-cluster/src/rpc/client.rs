use datacake_rpc::{Channel, RpcClient, Status};

use crate::ops::Operation;
use crate::rpc::services::operations_impl::{ApplyOperation, OperationsService};
use crate::rpc::services::transfer_impl::{PullState, TransferService};
use crate::state::StateSnapshot;

/// A high level wrapper around the operations RPC service.
pub struct OperationsClient {
    inner: RpcClient<OperationsService>,
}

impl OperationsClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: RpcClient::new(channel),
        }
    }

    /// Applies an operation on the remote member's state.
    ///
    /// Returns whether the remote state changed.
    pub async fn apply(&mut self, op: &Operation) -> Result<bool, Status> {
        let reply = self
            .inner
            .send(&ApplyOperation { op: op.clone() })
            .await?;

        let applied = reply.to_owned().map_err(|_| Status::invalid())?;
        Ok(applied.changed)
    }
}

/// A high level wrapper around the state transfer RPC service.
pub struct TransferClient {
    inner: RpcClient<TransferService>,
}

impl TransferClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: RpcClient::new(channel),
        }
    }

    /// Fetches the remote member's full replicated state.
    pub async fn pull_state(&mut self) -> Result<StateSnapshot, Status> {
        let reply = self.inner.send(&PullState).await?;
        reply.to_owned().map_err(|_| Status::invalid())
    }
}
