use std::net::{SocketAddr, TcpListener};

/// Gets a new socket address allocated by the OS.
///
/// The listener is dropped before the address is returned, so the port is
/// free to be bound again by the caller.
pub fn get_unused_addr() -> SocketAddr {
    let socket = TcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}
