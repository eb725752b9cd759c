pub(crate) mod gossip_transport;
pub(crate) mod network;
pub(crate) mod services;
