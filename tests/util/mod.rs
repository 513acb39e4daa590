//! Some nice utilities for writing automated tests for servers and reverse
//! proxies running on the same tokio runtime.

#![allow(dead_code)]

pub mod config;
pub mod http;
pub mod service;
pub mod tcp;
pub mod tls;
