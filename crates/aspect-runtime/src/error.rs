//! Runtime error types.

use aspect_engine::ProxyError;

/// Errors raised while loading configuration or registering services.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Synthesis or registration rejected by the engine
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}
