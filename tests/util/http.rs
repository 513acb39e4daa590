//! HTTP utilities for integrations tests.

use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{
    body::Incoming,
    client::conn::http1::SendRequest,
    service::Service,
    Request,
    Response,
};
use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpSocket, TcpStream},
    sync::{oneshot, watch},
    task::JoinHandle,
};

use super::{
    config,
    service::serve_connection,
    tcp::{local_listener, local_socket, wait_for_server},
};

/// Starts an upstream server in the background with a customizable request
/// handler, returning the listening address and task handle.
pub fn spawn_upstream_server<S>(service: S) -> (SocketAddr, JoinHandle<()>)
where
    S: Service<Request<Incoming>, Response = Response<Full<Bytes>>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    let (listener, addr) = local_listener();

    let handle = tokio::task::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let service = service.clone();
            tokio::task::spawn(serve_connection(stream, service));
        }
    });

    (addr, handle)
}

/// Starts an Auspice reverse proxy server in the background with the given
/// config.
pub fn spawn_reverse_proxy(replica: auspice::config::Replica) -> (SocketAddr, JoinHandle<()>) {
    let server = auspice::Server::init(replica, config::via()).unwrap();

    let addr = server.socket_address();

    let handle = tokio::task::spawn(async {
        server.run().await.unwrap();
    });

    (addr, handle)
}

/// Starts an Auspice reverse proxy server in the background with the given
/// config and provides access to shutdown trigger and state updates.
pub fn spawn_reverse_proxy_with_controllers(
    replica: auspice::config::Replica,
) -> (
    SocketAddr,
    JoinHandle<()>,
    impl FnOnce(),
    watch::Receiver<auspice::State>,
) {
    let (tx, rx) = oneshot::channel::<()>();

    let server = auspice::Server::init(replica, config::via())
        .unwrap()
        .shutdown_on(rx);

    let addr = server.socket_address();
    let state = server.subscribe();

    let handle = tokio::task::spawn(async {
        server.run().await.unwrap();
    });

    (addr, handle, || tx.send(()).unwrap(), state)
}

/// Launches a master task in the background.
pub fn spawn_master(
    config: auspice::config::NormalizedConfig,
) -> (Vec<SocketAddr>, JoinHandle<()>) {
    let master = auspice::Master::init(config, super::config::via()).unwrap();
    let sockets = master.sockets();
    let handle = tokio::task::spawn(async move {
        master.run().await.unwrap();
    });

    (sockets, handle)
}

/// Provides an HTTP client that spawns a connection object in the background
/// to manage request transmissions.
pub async fn http_client(stream: TcpStream) -> SendRequest<Empty<Bytes>> {
    http_client_over(stream).await
}

/// Same as [`http_client`] but over any stream, such as a TLS session.
pub async fn http_client_over<T>(io: T) -> SendRequest<Empty<Bytes>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .unwrap();
    tokio::task::spawn(async move { conn.with_upgrades().await.unwrap() });

    sender
}

/// Sends an HTTP request from the given [`TcpSocket`] to the given
/// [`SocketAddr`].
pub async fn send_http_request_from(
    from: TcpSocket,
    to: SocketAddr,
    req: Request<Empty<Bytes>>,
) -> (http::response::Parts, Bytes) {
    let stream = from.connect(to).await.unwrap();
    let mut sender = http_client(stream).await;

    let (parts, body) = sender.send_request(req).await.unwrap().into_parts();
    (parts, body.collect().await.unwrap().to_bytes())
}

/// Sends an HTTP request from a random socket to the given address.
pub async fn send_http_request(
    to: SocketAddr,
    req: Request<Empty<Bytes>>,
) -> (http::response::Parts, Bytes) {
    send_http_request_from(local_socket().0, to, req).await
}

/// Same as [`send_http_request_from`] but runs as a different task. This allows
/// the current task to continue execution.
pub fn spawn_client(
    target: SocketAddr,
    req: Request<Empty<Bytes>>,
) -> (SocketAddr, JoinHandle<()>) {
    let (socket, addr) = local_socket();

    let handle = tokio::task::spawn(async move {
        wait_for_server(target).await;
        send_http_request_from(socket, target, req).await;
    });

    (addr, handle)
}

pub mod request {
    //! Quick request factory.

    use bytes::Bytes;
    use http_body_util::Empty;
    use hyper::{header, Request};

    /// Request with the given `Host` header and no body.
    pub fn with_host(host: &str) -> Request<Empty<Bytes>> {
        Request::builder()
            .uri("/")
            .header(header::HOST, host)
            .body(Empty::<Bytes>::new())
            .unwrap()
    }

    /// Request without a `Host` header.
    pub fn without_host() -> Request<Empty<Bytes>> {
        Request::builder().body(Empty::<Bytes>::new()).unwrap()
    }
}
