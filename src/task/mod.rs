//! Tokio tasks that run the proxy. The [`master::Master`] spawns one
//! [`server::Server`] per listening address and each server spawns one task
//! per accepted connection. Tasks don't share mutable state: each server owns
//! its forwarding pipeline and every connection gets a cheap clone of it.

pub(crate) mod master;
pub(crate) mod server;
