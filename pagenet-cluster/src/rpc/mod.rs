mod client;
pub(crate) mod services;

pub use client::{OperationsClient, TransferClient};
pub use services::operations_impl::{ApplyOperation, OperationsService};
pub use services::transfer_impl::{PullState, TransferService};
