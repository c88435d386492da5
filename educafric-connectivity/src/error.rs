//! Error types for the connectivity subsystem.
//!
//! None of these ever reach the host application as a failure of the health
//! signal: probes map transport errors into unhealthy results, storage errors
//! are logged and dropped. They exist so the seams (transport, storage, peer
//! channel, config) can report precisely what went wrong.

/// Failure while executing an HTTP request through a transport
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(String),
    #[error("Timeout")]
    Timeout,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure while reading or writing the local key/value store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure while publishing on a peer-result channel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel closed: {0}")]
    Closed(String),
    #[error("No peers listening on {0}")]
    NoPeers(String),
}

/// Failure while loading the monitor configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
