//! Sockets bound to `127.0.0.1:0` so that tests running in parallel never
//! fight over ports.

use std::{net::SocketAddr, time::Duration};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// How many times [`wait_for_server`] tries to connect before giving up.
const CONNECT_ATTEMPTS: usize = 20;

/// Unconnected socket on a port picked by the OS, together with its address.
/// Tests use the address to check what the proxy reports as the client.
pub fn local_socket() -> (TcpSocket, SocketAddr) {
    let socket = TcpSocket::new_v4().unwrap();

    #[cfg(not(windows))]
    socket.set_reuseaddr(true).unwrap();

    socket.bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    let addr = socket.local_addr().unwrap();

    (socket, addr)
}

/// Listener for upstream servers whose connections are accepted by hand.
pub fn local_listener() -> (TcpListener, SocketAddr) {
    let (socket, addr) = local_socket();

    (socket.listen(1024).unwrap(), addr)
}

/// Servers are spawned as Tokio tasks, so they might not be accepting yet when
/// the test wants to talk to them.
pub async fn wait_for_server(addr: SocketAddr) {
    for attempt in 0..CONNECT_ATTEMPTS {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }

        tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
    }

    panic!("server {addr} is not accepting connections");
}

/// See [`wait_for_server`].
pub async fn wait_for_all(addrs: &[SocketAddr]) {
    for addr in addrs {
        wait_for_server(*addr).await;
    }
}
