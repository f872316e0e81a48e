//! Proxy error types

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Proxy operation errors
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pool document could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime configuration is unusable
    #[error(transparent)]
    RuntimeConfig(#[from] crate::config::ConfigError),

    /// Pool document parsed but failed validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Pool document on disk is unusable; the previous configuration stays live
    #[error("Invalid pool document '{path}': {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    /// Server host did not resolve to a socket address
    #[error("Cannot resolve {host}:{port}: {reason}")]
    Resolve {
        host: String,
        port: u16,
        reason: String,
    },

    /// Listener socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No socket is open for the destination's address family
    #[error("No {0} socket available for {1}")]
    NoSocket(&'static str, SocketAddr),

    /// Reactor thread could not be started or panicked
    #[error("Reactor error: {0}")]
    Reactor(String),
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
