//! # Pagenet
//! Tooling for running a small cluster of cooperating nodes which jointly
//! own one mutable, replicated paging-network state.
//!
//! This is a convenience package which includes the sub-projects within
//! Pagenet:
//!
//! ### Features
//! - `pagenet_node` - Gossip based cluster membership, failure detection and
//!   the RPC fabric shared by all higher layers.
//! - `pagenet_cluster` - The quorum gated, replicated state engine: operator
//!   users, transmitter node records and paging calls, bootstrapped
//!   deterministically and applied identically on every reachable member.

#[cfg(feature = "pagenet-cluster")]
pub use pagenet_cluster as cluster;
#[cfg(feature = "pagenet-node")]
pub use pagenet_node as node;
