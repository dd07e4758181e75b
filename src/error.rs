use std::io;

use thiserror::Error;

/// Errors surfaced by the listener and scheduler.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be set up. Fatal, reported before
    /// serving begins.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// A single accept call failed. Transient; the listener logs it and
    /// keeps going.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    /// A worker thread could not be started.
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] io::Error),
    /// Every worker has exited, so new tasks have nowhere to go.
    #[error("scheduler is no longer accepting tasks")]
    SchedulerClosed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-connection failures. Each one retires only the connection it
/// happened on.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("peer stopped accepting bytes")]
    WriteZero,
    #[error("peer closed the connection mid-request")]
    UnexpectedEof,
    /// The handler failed and the protocol has no error response for it.
    #[error("handler failed: {0}")]
    Handler(String),
}
