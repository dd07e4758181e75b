//! spinserve - busy-poll network server core
//!
//! Connections are state machines polled to completion by a fixed pool of
//! worker threads, with no OS readiness notification involved. Protocols
//! plug in through [`codec::Protocol`]; HTTP/1.1 and a line protocol ship
//! with the crate.

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod poll;
pub mod server;
