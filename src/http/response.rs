//! Responses generated by this proxy instead of the upstream server.

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};

use crate::ForwardingError;

/// Response type returned by the [`crate::service::Auspice`] service.
pub(crate) type BoxBodyResponse = Response<BoxBody<Bytes, hyper::Error>>;

/// Builds local responses with a short plain text body.
pub(crate) struct LocalResponse;

impl LocalResponse {
    pub fn with_status(status: StatusCode) -> BoxBodyResponse {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        let body = format!("HTTP {} {reason}\n", status.as_u16());

        let mut response = Response::new(
            Full::new(Bytes::from(body))
                .map_err(|never| match never {})
                .boxed(),
        );

        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        response
    }

    /// Client sent a request that can't be forwarded.
    pub fn rejected(err: &ForwardingError) -> BoxBodyResponse {
        Self::with_status(err.status())
    }

    /// Upstream server unreachable or misbehaving.
    pub fn bad_gateway() -> BoxBodyResponse {
        Self::with_status(StatusCode::BAD_GATEWAY)
    }
}
