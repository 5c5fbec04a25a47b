//! Proxy error types
//!
//! Every failure the pipeline can surface. Errors are raised where they are
//! detected and propagated unmodified to the caller.

use thiserror::Error;

/// Errors that can occur while talking to the search engine
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A parameter was out of range or had the wrong shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The target endpoint is not registered with the proxy
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not decode engine response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The engine itself reported an error, or answered with something unreadable
    #[error("Search engine error: {message}\n\nRequest was {request}\n\nResponse was {response}")]
    Engine {
        message: String,
        request: String,
        response: String,
    },

    /// A significant term had no background weight in any field
    #[error("Degenerate keyword score for '{0}': zero background count across fields")]
    DegenerateScore(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ProxyError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ProxyError::InvalidArgument(msg.into())
    }

    pub fn engine(
        message: impl Into<String>,
        request: &serde_json::Value,
        response: &serde_json::Value,
    ) -> Self {
        ProxyError::Engine {
            message: message.into(),
            request: request.to_string(),
            response: response.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
