//! Custom types and abstractions for proxy-based HTTP operations.

pub mod host;
pub mod request;
pub(crate) mod response;
