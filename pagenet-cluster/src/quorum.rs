use pagenet_node::ClusterView;
use tokio::sync::watch;

use crate::model::NodeStatus;
use crate::state::StateHandle;

/// How many reachable members are required before a write is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuorumPolicy {
    /// A strict majority of the known cluster membership.
    ///
    /// The known membership is the larger of the registered, non suspended
    /// node records and the currently reachable view.
    #[default]
    Majority,

    /// A fixed minimum number of reachable members.
    AtLeast(usize),
}

/// Decides whether enough members are reachable to safely admit a write.
///
/// [QuorumGate::is_quorum] is a pure, non blocking query against the current
/// view snapshot, it performs no network IO of its own.
#[derive(Clone)]
pub struct QuorumGate {
    view: watch::Receiver<ClusterView>,
    state: StateHandle,
    policy: QuorumPolicy,
}

impl QuorumGate {
    pub fn new(
        view: watch::Receiver<ClusterView>,
        state: StateHandle,
        policy: QuorumPolicy,
    ) -> Self {
        Self {
            view,
            state,
            policy,
        }
    }

    /// Whether the number of reachable members meets the configured quorum.
    pub fn is_quorum(&self) -> bool {
        let reachable = self.view.borrow().len();

        match self.policy {
            QuorumPolicy::AtLeast(required) => reachable >= required,
            QuorumPolicy::Majority => {
                let registered = self.state.with_read(|state| {
                    state
                        .nodes()
                        .values()
                        .filter(|node| node.status != NodeStatus::Suspended)
                        .count()
                });

                // A freshly formed cluster has no node records yet, the view
                // itself is the only source of the membership size.
                let known = registered.max(reachable).max(1);
                reachable >= known / 2 + 1
            },
        }
    }
}
