//! Structs derived from the config file using [`serde`].

mod deser;

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// This struct represents the entire configuration file, which describes a list
/// of servers and their particular configuration options. For example, this
/// configuration:
///
/// ```toml
/// [[server]]
///
/// listen = "127.0.0.1:8000"
/// forward = "127.0.0.1:8080"
///
/// [[server]]
///
/// listen = ["0.0.0.0:443", "0.0.0.0:8443"]
/// forward = "127.0.0.1:9000"
/// tls = { cert = "/etc/auspice/cert.pem", key = "/etc/auspice/key.pem" }
/// ```
///
/// Should result in a [`Vec`] containing two [`Server`] elements after
/// deserializing.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// List of all servers.
    #[serde(rename = "server")]
    pub servers: Vec<Server>,
}

/// Description of a single `[[server]]` instance in the config file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Server {
    /// Socket addresses where this server listens. Can be written as a single
    /// address or a list.
    #[serde(deserialize_with = "deser::one_or_many")]
    pub listen: Vec<SocketAddr>,

    /// Upstream server that receives the forwarded requests.
    pub forward: SocketAddr,

    /// Maximum number of simultaneous connections.
    #[serde(default = "default::max_connections", rename = "connections")]
    pub max_connections: usize,

    /// Optional server name to show in logs.
    pub name: Option<String>,

    /// Terminate TLS on the listening sockets of this server.
    pub tls: Option<Tls>,
}

/// Certificate chain and private key, both PEM encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tls {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Configuration of a server with exactly one listening address. See
/// [`Config::normalize`].
#[derive(Debug, Clone)]
pub struct Replica {
    /// Listening address.
    pub listen: SocketAddr,

    /// Upstream server.
    pub forward: SocketAddr,

    /// See [`Server::max_connections`].
    pub max_connections: usize,

    /// See [`Server::name`].
    pub name: Option<String>,

    /// See [`Server::tls`].
    pub tls: Option<Tls>,
}

impl Replica {
    /// Replica listening on `listen` and forwarding to `forward` with default
    /// options.
    pub fn new(listen: SocketAddr, forward: SocketAddr) -> Self {
        Self {
            listen,
            forward,
            max_connections: default::max_connections(),
            name: None,
            tls: None,
        }
    }
}

/// Configuration where each server has only one listening address.
#[derive(Debug, Clone)]
pub struct NormalizedConfig {
    pub replicas: Vec<Replica>,
}

impl Config {
    /// Reads and parses the TOML file located at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;

        Ok(toml::from_str(&content)?)
    }

    /// A server listening on multiple addresses is split into multiple
    /// replicas with the same options, one per address. See
    /// [`crate::task::master::Master`].
    pub fn normalize(self) -> NormalizedConfig {
        let replicas = self
            .servers
            .into_iter()
            .flat_map(|server| {
                let Server {
                    listen,
                    forward,
                    max_connections,
                    name,
                    tls,
                } = server;

                listen.into_iter().map(move |listen| Replica {
                    listen,
                    forward,
                    max_connections,
                    name: name.clone(),
                    tls: tls.clone(),
                })
            })
            .collect();

        NormalizedConfig { replicas }
    }
}

mod default {
    //! Default values for some configuration options.

    pub fn max_connections() -> usize {
        1024
    }
}
