//! The [`hyper`] library is based on services. Each time we accept a connection
//! we have to provide an instance of [`hyper::service::Service`] to handle that
//! connection. This module contains the [`Auspice`] struct which implements
//! [`hyper::service::Service`]: it runs the forwarding [`Pipeline`] on every
//! request and relays the result to the upstream server of the
//! [`crate::Server`] that accepted the connection.

mod proxy;

use std::{future::Future, net::SocketAddr, pin::Pin};

use hyper::{body::Incoming, service::Service, Request};

use crate::{
    forwarding::Pipeline,
    http::{
        request::{Connection, ProxyRequest},
        response::{BoxBodyResponse, LocalResponse},
    },
};

/// Implements [`Service`] and handles incoming requests.
pub(crate) struct Auspice {
    /// Forwarding stages shared by all connections of a server.
    pipeline: Pipeline,

    /// Upstream server address.
    upstream: SocketAddr,

    /// Connection handled by this service instance.
    connection: Connection,
}

impl Auspice {
    /// Creates a new [`Auspice`] service.
    pub fn new(pipeline: Pipeline, upstream: SocketAddr, connection: Connection) -> Self {
        Self {
            pipeline,
            upstream,
            connection,
        }
    }
}

impl Service<Request<Incoming>> for Auspice {
    type Response = BoxBodyResponse;

    type Error = hyper::Error;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let pipeline = self.pipeline.clone();
        let upstream = self.upstream;
        let connection = self.connection;

        Box::pin(async move {
            let mut request = ProxyRequest::new(request, connection);

            if let Err(err) = request.forward_through(&pipeline) {
                tracing::warn!(client = %connection.client_addr, %err, "rejecting request");
                return Ok(LocalResponse::rejected(&err));
            }

            proxy::forward(request, upstream).await
        })
    }
}
