use std::net::SocketAddr;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use pagenet_node::{ClusterView, RpcNetwork};
use tokio::sync::watch;

use crate::error::OperationError;
use crate::model::normalize_name;
use crate::ops::Operation;
use crate::quorum::QuorumGate;
use crate::rpc::OperationsClient;
use crate::state::StateHandle;

/// The entry point used by upstream request handlers to submit state
/// operations to the cluster.
///
/// Admitted operations are applied on the local state and broadcast to every
/// reachable peer so all members converge on identical state. The quorum
/// check, validation and identity resolution all happen before any network
/// interaction; a rejected operation has no side effect anywhere.
#[derive(Clone)]
pub struct OperationDispatcher {
    state: StateHandle,
    network: RpcNetwork,
    view: watch::Receiver<ClusterView>,
    gate: QuorumGate,
}

impl OperationDispatcher {
    pub fn new(
        state: StateHandle,
        network: RpcNetwork,
        view: watch::Receiver<ClusterView>,
        gate: QuorumGate,
    ) -> Self {
        Self {
            state,
            network,
            view,
            gate,
        }
    }

    #[inline]
    pub fn gate(&self) -> &QuorumGate {
        &self.gate
    }

    /// Submits an operation for replicated execution.
    ///
    /// The admission sequence is fixed: quorum gate, operand presence,
    /// structural validation, then identity resolution for deletions. Only
    /// an operation which passed all checks is applied and broadcast.
    pub async fn submit(
        &self,
        op: Option<Operation>,
        quorum_required: bool,
    ) -> Result<(), OperationError> {
        if quorum_required && !self.gate.is_quorum() {
            return Err(OperationError::NoQuorum);
        }

        let op = op.ok_or(OperationError::EmptyInput)?;
        op.validate()?;

        if let Some((kind, name)) = op.delete_target() {
            let key = normalize_name(name);
            let exists = self.state.with_read(|state| state.contains(kind, &key));
            if !exists {
                return Err(OperationError::NotFound(name.to_string()));
            }
        }

        // The peer set is extracted from the view snapshot before taking the
        // write lock; the lock is released again before any RPC is made.
        let peers: Vec<SocketAddr> = {
            let view = self.view.borrow();
            view.peers().map(|member| member.public_addr).collect()
        };

        let changed = self.state.with_write(|state| state.apply(&op));
        self.state.persist_best_effort();

        debug!(
            op = op.name(),
            changed,
            num_peers = peers.len(),
            "Applied operation on local state."
        );

        if peers.is_empty() {
            return Ok(());
        }

        self.broadcast(&op, peers).await
    }

    /// Invokes the operation on every reachable peer.
    async fn broadcast(
        &self,
        op: &Operation,
        peers: Vec<SocketAddr>,
    ) -> Result<(), OperationError> {
        let mut requests = peers
            .into_iter()
            .map(|addr| {
                let op = op.clone();
                let network = self.network.clone();
                async move {
                    let channel = network.get_or_connect(addr).map_err(|e| {
                        OperationError::OperationFailed {
                            addr,
                            status: datacake_rpc::Status::connection(e),
                        }
                    })?;

                    let mut client = OperationsClient::new(channel);
                    client
                        .apply(&op)
                        .await
                        .map_err(|status| OperationError::OperationFailed { addr, status })?;

                    Ok::<_, OperationError>(())
                }
            })
            .collect::<FuturesUnordered<_>>();

        let mut first_error = None;
        while let Some(res) = requests.next().await {
            if let Err(error) = res {
                error!(
                    error = %error,
                    op = op.name(),
                    "Peer failed to acknowledge the replicated operation."
                );
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}
