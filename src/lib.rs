//! Auspice is a reverse proxy that relays requests to an upstream server
//! after normalizing the forwarding headers, so the upstream server can find
//! out who the client was, which port and protocol it used and which proxies
//! the request went through. See [`forwarding`] for the header transforms.

mod error;
mod service;
mod task;

pub mod config;
pub mod forwarding;
pub mod http;
pub mod logging;
pub mod tls;

pub use error::{Error, ForwardingError};
pub use crate::http::request::{Connection, Transport};
pub use task::{
    master::Master,
    server::{Server, ShutdownState, State},
};
