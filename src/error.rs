//! Error types. [`ForwardingError`] is raised per request by the forwarding
//! stages and always ends up as a client error response, while [`Error`]
//! covers everything that can go wrong while setting up or running servers.

use std::{io, path::PathBuf};

use http::StatusCode;
use thiserror::Error;

/// Request-level failures of the forwarding stages. These describe a
/// malformed request, not a transient condition, so there's nothing to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardingError {
    /// The request has no `Host` header, so we can't resolve the client-facing
    /// port nor rewrite the host for the upstream server.
    #[error("request has no Host header")]
    MissingHostHeader,

    /// The `Host` header is not `hostname[:port]` or `[ipv6][:port]`.
    #[error("invalid Host header {0:?}")]
    InvalidHostFormat(String),
}

impl ForwardingError {
    /// Status code of the response sent back to the client.
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Process-level errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("no certificates found in {0}")]
    MissingCertificate(PathBuf),

    #[error("no private key found in {0}")]
    MissingPrivateKey(PathBuf),

    #[error("invalid port pair {listen} -> {upstream}, ports must be in range 1-65535")]
    InvalidPortPair { listen: u16, upstream: u16 },

    #[error("version {0:?} can't be used in a Via header")]
    InvalidVersion(String),
}
