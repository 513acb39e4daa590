use std::{future::Future, net::SocketAddr, pin::Pin, sync::Arc};

use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpSocket},
    sync::{watch, Semaphore},
    task::JoinSet,
};
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::{
    config::Replica,
    forwarding::{Pipeline, PortPair, ViaIdentity},
    http::request::{Connection, Transport},
    service::Auspice,
    tls,
};

/// The [`Server`] struct represents a single listening socket of a
/// `[[server]]` instance from the config file. It is responsible for accepting
/// new connections and spawning Tokio tasks to handle them, as well as
/// gracefully stopping. When the shutdown future completes, the server stops
/// accepting connections and waits for the connected clients to finish:
///
/// ```text
///                     +--------+
///                     | Server |
///                     +--------+
///                         |
///                         v
///                     +--------+
///                +--- | Select | ---+
///                |    +--------+    |
///                v                  v
///          +----------+       +----------+
///          |  Accept  |       | Shutdown |
///          +----------+       +----------+
///                |                  |
///                v                  v
///          +----------+       +----------+
///          |  Spawn   |       |   Wait   |
///          +----------+       +----------+
///                |                  |
///                v                  v
/// +--------+   +--------+   +--------+   +--------+
/// | Task 1 |   | Task 2 |   | Task 3 |   | Task 4 |
/// +--------+   +--------+   +--------+   +--------+
/// ```
pub struct Server {
    /// State updates channel. Subscribers can use this to check the current
    /// [`State`] of this server.
    state: watch::Sender<State>,

    /// TCP listener used to accept connections.
    listener: TcpListener,

    /// Configuration for this server.
    config: Replica,

    /// Socket address used by this server to listen for incoming connections.
    address: SocketAddr,

    /// Forwarding stages run on every request.
    pipeline: Pipeline,

    /// Present if this server terminates TLS.
    tls: Option<TlsAcceptor>,

    /// Shutdown future, this can be anything, which allows us to easily write
    /// integration tests. When this future completes, the server starts the
    /// shutdown process.
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,

    /// Connections are limited to a maximum number. In order to allow a new
    /// connection we have to acquire a permit from the semaphore.
    connections: Arc<Semaphore>,
}

/// Represents the current state of the server.
#[derive(Debug, PartialEq, Eq)]
pub enum State {
    /// Server has started but is not accepting connections yet.
    Starting,

    /// Server is accepting incoming connections.
    Listening,

    /// Maximum number of connections reached.
    MaxConnectionsReached(usize),

    /// Server is gracefully shutting down.
    ShuttingDown(ShutdownState),
}

/// Represents a state in the graceful shutdown process.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShutdownState {
    /// The server has received the shutdown signal and won't accept more
    /// connections, but it will still process data for currently connected
    /// sockets.
    PendingConnections(usize),

    /// Shutdown process complete.
    Done,
}

impl Server {
    /// Initializes a [`Server`] with the given `config`. This process makes
    /// sure that the listening address can be used, loads the TLS material if
    /// any and builds the forwarding pipeline, but does not accept connections
    /// yet. In order to process incoming connections, [`Server::run`] must be
    /// called and `await`ed. We do it this way because we use the port 0 for
    /// integration tests, which allows the OS to pick any available port, but
    /// we still want to know which port the server is using.
    pub fn init(config: Replica, via: ViaIdentity) -> Result<Self, crate::Error> {
        let (state, _) = watch::channel(State::Starting);

        let socket = if config.listen.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        #[cfg(not(windows))]
        socket.set_reuseaddr(true)?;

        socket.bind(config.listen)?;

        let listener = socket.listen(1024)?;

        // If the TCP port is 0 then the OS will choose a valid one.
        let address = listener.local_addr()?;

        let ports = PortPair::new(address.port(), config.forward.port())?;
        let pipeline = Pipeline::forwarding(ports, via);

        let tls = config.tls.as_ref().map(tls::acceptor).transpose()?;

        // Don't shutdown on anything by default. CTRL-C will forcefully kill
        // the process.
        let shutdown = Box::pin(std::future::pending());

        let connections = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            state,
            listener,
            config,
            address,
            pipeline,
            tls,
            shutdown,
            connections,
        })
    }

    /// The [`Server`] will poll the given `future` and whenever it completes,
    /// the graceful shutdown process starts. If only one server is
    /// instantiated, this could be called with [`tokio::signal::ctrl_c`], but
    /// it can be any [`Future`] since we need customization for integration
    /// tests and spawning multiple servers using [`super::master::Master`].
    pub fn shutdown_on(mut self, future: impl Future + Send + 'static) -> Self {
        self.shutdown = Box::pin(async move {
            future.await;
        });

        self
    }

    /// Address of the listening socket. This is necessary for obtaining the
    /// actual address in cases port 0 was used.
    pub fn socket_address(&self) -> SocketAddr {
        self.address
    }

    /// By subscribing to this server the caller obtains a channel where the
    /// current state of the server can be read.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// This is the entry point, by calling and `await`ing this function the
    /// server starts to process connections.
    pub async fn run(self) -> Result<(), crate::Error> {
        let log_name = match self.config.name {
            Some(ref name) => format!("{} ({name})", self.address),
            None => self.address.to_string(),
        };

        let span = tracing::info_span!("server", name = %log_name);

        self.serve().instrument(span).await
    }

    async fn serve(self) -> Result<(), crate::Error> {
        let Self {
            config,
            state,
            listener,
            pipeline,
            tls,
            shutdown,
            connections,
            ..
        } = self;

        state.send_replace(State::Listening);
        tracing::info!(
            upstream = %config.forward,
            tls = tls.is_some(),
            "listening for requests"
        );

        let mut tasks = JoinSet::new();

        let listener = Listener {
            listener,
            config: &config,
            pipeline,
            tls,
            state: &state,
            connections,
        };

        tokio::select! {
            result = listener.listen(&mut tasks) => {
                if let Err(err) = result {
                    tracing::error!(%err, "error while accepting connections");
                }
            }
            _ = shutdown => {
                tracing::info!("received shutdown signal");
            }
        }

        // Drop the listener to stop accepting new connections. This will cause
        // a "Connection Refused" error on any new client socket that attempts
        // to connect. Already connected sockets will still be able to send and
        // receive data.
        drop(listener);

        while tasks.try_join_next().is_some() {}

        if !tasks.is_empty() {
            tracing::info!(pending = tasks.len(), "can't shutdown yet, waiting for connections");
            state.send_replace(State::ShuttingDown(ShutdownState::PendingConnections(
                tasks.len(),
            )));
            while tasks.join_next().await.is_some() {}
        }

        state.send_replace(State::ShuttingDown(ShutdownState::Done));
        tracing::info!("shutdown complete");

        Ok(())
    }
}

/// Listens for incoming connections and spawns tasks to handle them if permits
/// are available.
struct Listener<'a> {
    /// Underlying TCP listener. We take ownership of this so that when this
    /// struct is dropped the socket is also dropped and we stop accepting
    /// connections.
    listener: TcpListener,

    /// Reference to the configuration of this server.
    config: &'a Replica,

    /// Cloned into every connection.
    pipeline: Pipeline,

    /// Cloned into every connection if present.
    tls: Option<TlsAcceptor>,

    /// Used to update the state when max connections are reached.
    state: &'a watch::Sender<State>,

    /// Connections permits.
    connections: Arc<Semaphore>,
}

impl<'a> Listener<'a> {
    pub async fn listen(&self, tasks: &mut JoinSet<()>) -> Result<(), crate::Error> {
        loop {
            // Reap connections that are already done.
            while tasks.try_join_next().is_some() {}

            let mut notify_listening_again = false;

            if self.connections.available_permits() == 0 {
                tracing::warn!(
                    max = self.config.max_connections,
                    "reached max connections"
                );
                self.state
                    .send_replace(State::MaxConnectionsReached(self.config.max_connections));
                notify_listening_again = true;
            }

            // The semaphore is never closed.
            let Ok(permit) = self.connections.clone().acquire_owned().await else {
                return Ok(());
            };

            if notify_listening_again {
                tracing::info!("accepting connections again");
                self.state.send_replace(State::Listening);
            }

            let (stream, client_addr) = self.listener.accept().await?;
            let server_addr = stream.local_addr()?;

            let upstream = self.config.forward;
            let pipeline = self.pipeline.clone();
            let tls = self.tls.clone();

            let connection = async move {
                match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => {
                            let connection =
                                Connection::new(client_addr, server_addr, Transport::Tls);
                            serve(stream, Auspice::new(pipeline, upstream, connection)).await;
                        }
                        Err(err) => {
                            tracing::warn!(client = %client_addr, %err, "TLS handshake failed");
                        }
                    },
                    None => {
                        let connection = Connection::new(client_addr, server_addr, Transport::Plain);
                        serve(stream, Auspice::new(pipeline, upstream, connection)).await;
                    }
                }

                // Permit is dropped only when the accepted socket is done
                // sending and receiving data.
                drop(permit);
            };

            tasks.spawn(connection.in_current_span());
        }
    }
}

/// Serves HTTP/1.1 requests on an accepted stream until the client closes it.
async fn serve<S>(stream: S, service: Auspice)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    if let Err(err) = hyper::server::conn::http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        tracing::debug!(%err, "failed to serve connection");
    }
}
