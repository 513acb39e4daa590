//! Request transforms that run right before a request is relayed upstream.
//! The upstream server only sees the connection of this proxy, so these
//! stages rewrite `Host` and append to the `X-Forwarded-*` and `Via` headers
//! in order to let it reconstruct the client-facing view of the request.
//!
//! Each transform implements [`Stage`] and a [`Pipeline`] drives them in a
//! fixed order. A stage either returns `Ok(())`, which lets the pipeline
//! continue with the next one, or a [`ForwardingError`] that stops the
//! pipeline and rejects the request. Stages are synchronous and never block.

mod context;
mod host;
mod via;
mod x_forwarded;

pub use context::{ForwardingContext, Scheme};
pub use host::{HostRewriter, PortPair};
pub use via::{ViaIdentity, DEFAULT_VERSION};
pub use x_forwarded::XForwarded;

use std::sync::Arc;

use http::{
    header::{self, HeaderName, HeaderValue},
    HeaderMap,
};

use crate::{http::request::Connection, ForwardingError};

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_FORWARDED_PORT: HeaderName = HeaderName::from_static("x-forwarded-port");
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Per-request state handed to every [`Stage`]. Stages may only mutate the
/// headers, the rest is read-only.
pub struct Hop<'a> {
    headers: &'a mut HeaderMap,

    connection: &'a Connection,

    /// `Host` header as received from the client, captured before any stage
    /// runs. Stages that need the client-facing host must read this one
    /// because [`HostRewriter`] replaces the header in place.
    inbound_host: Result<HeaderValue, ForwardingError>,
}

impl<'a> Hop<'a> {
    pub fn new(headers: &'a mut HeaderMap, connection: &'a Connection) -> Self {
        let inbound_host = single_host(headers).cloned();

        Self {
            headers,
            connection,
            inbound_host,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &*self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut *self.headers
    }

    pub fn connection(&self) -> &Connection {
        self.connection
    }

    /// Same as [`single_host`] but on the headers received from the client.
    pub fn inbound_host(&self) -> Result<&HeaderValue, ForwardingError> {
        self.inbound_host.as_ref().map_err(Clone::clone)
    }
}

/// Returns the only `Host` header in `headers`. A request with more than one
/// `Host` header has no well defined authority and is rejected the same way
/// as an unparseable one.
pub fn single_host(headers: &HeaderMap) -> Result<&HeaderValue, ForwardingError> {
    let mut hosts = headers.get_all(header::HOST).iter();

    let host = hosts.next().ok_or(ForwardingError::MissingHostHeader)?;

    if hosts.next().is_some() {
        let all = headers
            .get_all(header::HOST)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
            .collect::<Vec<_>>()
            .join(",");

        return Err(ForwardingError::InvalidHostFormat(all));
    }

    Ok(host)
}

/// A single request transform.
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Transforms the request. Must not touch `hop` at all when it returns an
    /// error.
    fn on_request(&self, hop: &mut Hop<'_>) -> Result<(), ForwardingError>;
}

/// Ordered list of [`Stage`] instances run for every request. Cloning is
/// cheap, all clones share the same stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    /// Default pipeline of this proxy: host rewriting followed by
    /// `X-Forwarded-*` and `Via` augmentation.
    pub fn forwarding(ports: PortPair, via: ViaIdentity) -> Self {
        Self::new(vec![
            Arc::new(HostRewriter::new(ports)),
            Arc::new(XForwarded::new(via)),
        ])
    }

    /// Runs every stage in order, stopping at the first failure.
    pub fn process_request(&self, hop: &mut Hop<'_>) -> Result<(), ForwardingError> {
        for stage in self.stages.iter() {
            if let Err(err) = stage.on_request(hop) {
                tracing::debug!(stage = stage.name(), %err, "stage rejected request");
                return Err(err);
            }
        }

        Ok(())
    }
}

/// Sets `name` to `value`, or appends `value` to the current content of the
/// header separated by a comma if the header is already present, so the
/// result looks like this:
///
/// ```text
/// x-forwarded-for: 129.78.138.66,129.78.64.103
/// ```
///
/// Values are never deduplicated. If the client sent the header multiple
/// times, all instances are folded into a single one in the order received.
pub fn chain_header(headers: &mut HeaderMap, name: &HeaderName, value: HeaderValue) {
    let mut chain = Vec::new();

    for current in headers.get_all(name) {
        chain.extend_from_slice(current.as_bytes());
        chain.push(b',');
    }

    if chain.is_empty() {
        headers.insert(name.clone(), value);
        return;
    }

    chain.extend_from_slice(value.as_bytes());

    // Joining valid header values with commas can't produce invalid bytes.
    let chained = HeaderValue::from_bytes(&chain).unwrap_or(value);

    headers.insert(name.clone(), chained);
}
