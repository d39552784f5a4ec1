//! Error types for hello-core

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for hello-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the hello HTTP server
#[derive(Debug, Error)]
pub enum Error {
    /// Hostname and port do not form a socket address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Listener could not be bound (port in use, insufficient privilege)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Route registered twice
    #[error("Duplicate route: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response could not be converted for hyper
    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// True for the startup failure that should terminate the process
    pub fn is_bind(&self) -> bool {
        matches!(self, Error::Bind { .. })
    }
}
