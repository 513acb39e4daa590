use http::header;

use super::{
    chain_header, ForwardingContext, Hop, Stage, ViaIdentity, X_FORWARDED_FOR, X_FORWARDED_PORT,
    X_FORWARDED_PROTO,
};
use crate::ForwardingError;

/// Appends `x-forwarded-for`, `x-forwarded-port`, `x-forwarded-proto` and
/// `via` to the request. If these headers are already set by previous
/// proxies, our values are appended to the existing ones. See
/// [`chain_header`].
#[derive(Debug, Clone)]
pub struct XForwarded {
    via: ViaIdentity,
}

impl XForwarded {
    pub fn new(via: ViaIdentity) -> Self {
        Self { via }
    }
}

impl Stage for XForwarded {
    fn name(&self) -> &'static str {
        "x-forwarded"
    }

    fn on_request(&self, hop: &mut Hop<'_>) -> Result<(), ForwardingError> {
        // Resolve first so that a bad request leaves the headers untouched.
        let context = ForwardingContext::resolve(hop)?;

        let headers = hop.headers_mut();

        chain_header(headers, &X_FORWARDED_FOR, context.address_value());
        chain_header(headers, &X_FORWARDED_PORT, context.port_value());
        chain_header(headers, &X_FORWARDED_PROTO, context.scheme_value());
        chain_header(headers, &header::VIA, self.via.header_value().clone());

        Ok(())
    }
}
