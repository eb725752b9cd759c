pub(crate) mod operations_impl;
pub(crate) mod transfer_impl;
