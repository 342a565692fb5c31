use thiserror::Error;

/// NetworkError represents all possible errors that can occur within the serving layer
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Listener could not be bound; the only process-fatal error
    #[error("Bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP protocol errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] hyper::Error),

    /// Upgrade request outside the tunnel namespace
    #[error("Upgrade rejected for {path}")]
    UpgradeRejected { path: String },

    /// Tunnel or assistant upstream failed
    #[error("Upstream failure: {0}")]
    UpstreamError(String),

    /// Assistant request failed
    #[error("Assistant error: {0}")]
    AssistantError(#[from] reqwest::Error),

    /// Request body exceeded the configured limit
    #[error("Request body larger than {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    /// IO errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for networking operations
pub type NetworkResult<T> = Result<T, NetworkError>;
