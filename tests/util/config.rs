//! Configuration factories for integrations tests.

use std::net::SocketAddr;

use auspice::{
    config::{NormalizedConfig, Replica},
    forwarding::ViaIdentity,
};

/// Version used in the `Via` header of every proxy spawned by tests.
pub const VERSION: &str = "test";

pub fn via() -> ViaIdentity {
    ViaIdentity::new(VERSION).unwrap()
}

/// Proxy listening on a random port and forwarding to `upstream`.
pub fn single_upstream(upstream: SocketAddr) -> Replica {
    Replica::new("127.0.0.1:0".parse().unwrap(), upstream)
}

/// Multiple proxies listening on random ports, all of them forwarding to
/// `upstream`.
pub fn replicas(upstream: SocketAddr, count: usize) -> NormalizedConfig {
    NormalizedConfig {
        replicas: (0..count).map(|_| single_upstream(upstream)).collect(),
    }
}
