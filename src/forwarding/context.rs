use http::HeaderValue;

use super::Hop;
use crate::{http::host::Host, ForwardingError};

/// Protocol used by the client to reach this proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port implied by the scheme when the client didn't send one.
    pub fn default_port(self) -> &'static str {
        match self {
            Scheme::Http => "80",
            Scheme::Https => "443",
        }
    }
}

/// Client-facing view of a request: who sent it, to which port and using
/// which protocol. Computed for every request, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingContext {
    /// IP address of the peer that connected to this proxy.
    pub address: String,

    /// Port the client connected to, according to the `Host` header or the
    /// transport if the header has no port.
    pub port: String,

    pub scheme: Scheme,
}

impl ForwardingContext {
    /// Resolves the context of the request in `hop`. The port comes from the
    /// `Host` header as received from the client, so it doesn't matter whether
    /// the host was already rewritten by another stage.
    pub fn resolve(hop: &Hop<'_>) -> Result<Self, ForwardingError> {
        let host = hop.inbound_host()?;

        let connection = hop.connection();

        let scheme = if connection.transport.is_secure() {
            Scheme::Https
        } else {
            Scheme::Http
        };

        let port = Host::try_from(host)?
            .port()
            .unwrap_or(scheme.default_port())
            .to_owned();

        Ok(Self {
            address: connection.client_addr.ip().to_string(),
            port,
            scheme,
        })
    }

    pub fn address_value(&self) -> HeaderValue {
        Self::value(&self.address)
    }

    pub fn port_value(&self) -> HeaderValue {
        Self::value(&self.port)
    }

    pub fn scheme_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.scheme.as_str())
    }

    /// IP addresses and port digits are always valid header values.
    fn value(visible_ascii: &str) -> HeaderValue {
        HeaderValue::from_str(visible_ascii).unwrap_or(HeaderValue::from_static(""))
    }
}
