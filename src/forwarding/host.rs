use http::{header, HeaderValue};

use super::{single_host, Hop, Stage};
use crate::{http::host::Host, Error, ForwardingError};

/// Ports on both sides of this proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    /// Port where the proxy accepts client connections.
    pub listen: u16,

    /// Port of the upstream server.
    pub upstream: u16,
}

impl PortPair {
    pub fn new(listen: u16, upstream: u16) -> Result<Self, Error> {
        if listen == 0 || upstream == 0 {
            return Err(Error::InvalidPortPair { listen, upstream });
        }

        Ok(Self { listen, upstream })
    }
}

/// Rewrites the port of the `Host` header so that it matches the port of the
/// upstream server. Default ports (80 and 443) are omitted:
///
/// ```text
/// Host: example.com:8080  ->  Host: example.com:9000   (upstream 9000)
/// Host: example.com:8080  ->  Host: example.com        (upstream 80)
/// Host: [::1]             ->  Host: [::1]:9000         (upstream 9000)
/// ```
#[derive(Debug, Clone)]
pub struct HostRewriter {
    /// Either empty or `:<upstream port>`.
    suffix: String,
}

impl HostRewriter {
    pub fn new(ports: PortPair) -> Self {
        let suffix = match ports.upstream {
            80 | 443 => String::new(),
            port => format!(":{port}"),
        };

        Self { suffix }
    }

    /// Returns the new value for the given `host`.
    pub fn rewrite(&self, host: &HeaderValue) -> Result<HeaderValue, ForwardingError> {
        let host = Host::try_from(host)?;
        let rewritten = format!("{}{}", host.name(), self.suffix);

        HeaderValue::from_str(&rewritten)
            .map_err(|_| ForwardingError::InvalidHostFormat(host.to_string()))
    }
}

impl Stage for HostRewriter {
    fn name(&self) -> &'static str {
        "host"
    }

    fn on_request(&self, hop: &mut Hop<'_>) -> Result<(), ForwardingError> {
        let host = single_host(hop.headers())?;
        let rewritten = self.rewrite(host)?;

        hop.headers_mut().insert(header::HOST, rewritten);

        Ok(())
    }
}
