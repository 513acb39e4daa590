use std::{
    future::{self, Future},
    net::SocketAddr,
    pin::Pin,
};

use tokio::sync::broadcast;

use crate::{config::NormalizedConfig, forwarding::ViaIdentity, Server};

/// The master task is responsible for creating, spawning and shutting down all
/// the [`Server`] instances described in the configuration file.
///
/// # Replicas
///
/// The configuration file allows a single server to listen on multiple
/// IP addresses or ports:
///
/// ```toml
/// [[server]]
///
/// listen = ["127.0.0.1:8080", "127.0.0.1:8081"]
/// forward = "127.0.0.1:9000"
/// ```
///
/// Instead of managing multiple listeners within a [`Server`], we create a
/// "replica" for each listening address, see
/// [`crate::config::Config::normalize`]. Every replica gets its own forwarding
/// pipeline because the `Host` rewriting depends on the listening port. All
/// of them share the same [`ViaIdentity`], which is built once per process.
///
/// ```text
///                         +--------+
///                         | CTRL-C |
///                         +--------+
///                              |
///                              | Shutdown event (SIGINT)
///                              V
///                         +--------+
///                         | Master |
///                         +--------+
///                              |
///                              | Forward the signal to each server.
///                              |
///               +--------------+--------------+
///               |                             |
///               v                             v
///          +----------+                 +----------+
///          | Server 1 |                 | Server 2 |
///          +----------+                 +----------+
/// ```
pub struct Master {
    /// All the servers that the master has spawned.
    servers: Vec<Server>,

    /// Listening address of each server, in the same order as `servers`.
    sockets: Vec<SocketAddr>,

    /// Shutdown future. The master polls this future and when it's ready it
    /// sends the shutdown signal to all the servers, then waits for them to
    /// finish their pending tasks.
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,

    /// Shutdown notifications channel. Spawned servers are subscribed to this
    /// channel and can receive the shutdown signal.
    shutdown_notify: broadcast::Sender<()>,
}

impl Master {
    /// Attempts to initialize all the servers in the received `config`. The
    /// initialization only acquires and configures the TCP sockets, but does
    /// not listen or accept connections. See [`Server::init`] for more
    /// details.
    pub fn init(config: NormalizedConfig, via: ViaIdentity) -> Result<Self, crate::Error> {
        let mut servers = Vec::new();
        let mut sockets = Vec::new();
        let shutdown = Box::pin(future::pending());
        let (shutdown_notify, _) = broadcast::channel(1);

        for replica in config.replicas {
            let server = Server::init(replica, via.clone())?;
            sockets.push(server.socket_address());
            servers.push(server);
        }

        Ok(Self {
            servers,
            sockets,
            shutdown,
            shutdown_notify,
        })
    }

    /// When `future` is ready, the graceful shutdown process begins.
    pub fn shutdown_on(mut self, future: impl Future + Send + 'static) -> Self {
        self.servers = self
            .servers
            .into_iter()
            .map(|server| {
                let mut shutdown_notification = self.shutdown_notify.subscribe();
                server.shutdown_on(async move { shutdown_notification.recv().await })
            })
            .collect();

        self.shutdown = Box::pin(async move {
            future.await;
        });

        self
    }

    /// All the servers are put into `listen` mode and they start accepting
    /// connections.
    pub async fn run(self) -> Result<(), crate::Error> {
        let mut set = tokio::task::JoinSet::new();

        for server in self.servers {
            set.spawn(server.run());
        }

        let mut first_error = None;

        tokio::select! {
            Some(Ok(Err(err))) = set.join_next() => {
                tracing::error!(%err, "server failed, shutting down");
                first_error = Some(err);
            }

            _ = self.shutdown => {
                tracing::info!("sending shutdown signal to all servers");
            }
        }

        // Nobody is subscribed if all servers are gone already.
        let _ = self.shutdown_notify.send(());

        while let Some(result) = set.join_next().await {
            match result {
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(err) => tracing::error!(%err, "server task panicked"),
                Ok(Ok(())) => {}
            }
        }

        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Returns all the listening sockets.
    pub fn sockets(&self) -> Vec<SocketAddr> {
        self.sockets.clone()
    }
}
