pub(crate) mod gossip_impl;
