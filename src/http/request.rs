//! Proxy requests require additional information attached to them such as
//! the IP address of the client or whether the connection went through TLS,
//! which we can't obtain using [`hyper::Request`] alone.

use std::net::SocketAddr;

use http::{Extensions, HeaderMap};
use hyper::Request;

use crate::{
    forwarding::{Hop, Pipeline},
    ForwardingError,
};

/// Transport the client used to reach this proxy. This is the only signal we
/// use to decide whether a request "arrived over TLS", and it's set by the
/// listener that accepted the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain TCP.
    Plain,

    /// TLS terminated by this proxy.
    Tls,
}

impl Transport {
    pub fn is_secure(self) -> bool {
        self == Transport::Tls
    }
}

/// Everything we know about the client connection that carried a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Client socket.
    pub client_addr: SocketAddr,

    /// Local socket currently handling this request.
    pub server_addr: SocketAddr,

    /// See [`Transport`].
    pub transport: Transport,
}

impl Connection {
    pub fn new(client_addr: SocketAddr, server_addr: SocketAddr, transport: Transport) -> Self {
        Self {
            client_addr,
            server_addr,
            transport,
        }
    }
}

/// Request received by this proxy from a client.
pub(crate) struct ProxyRequest<T> {
    /// Original client request.
    request: Request<T>,

    /// Connection that carried the request.
    connection: Connection,
}

impl<T> ProxyRequest<T> {
    /// Creates a new [`ProxyRequest`].
    pub fn new(request: Request<T>, connection: Connection) -> Self {
        Self {
            request,
            connection,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        self.request.extensions_mut()
    }

    /// Runs all the stages of `pipeline` on this request. If any stage fails
    /// the request should not be forwarded.
    pub fn forward_through(&mut self, pipeline: &Pipeline) -> Result<(), ForwardingError> {
        let mut hop = Hop::new(self.request.headers_mut(), &self.connection);
        pipeline.process_request(&mut hop)
    }

    /// Consumes the [`ProxyRequest`] returning the [`hyper::Request`] that
    /// should be sent to the upstream server.
    pub fn into_forwarded(self) -> Request<T> {
        self.request
    }
}
