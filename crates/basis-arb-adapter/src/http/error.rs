/*
[INPUT]:  Error sources (HTTP, API, serialization, WebSocket)
[OUTPUT]: Structured error types with retry hints
[POS]:    Error handling layer - unified error types for the adapter
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the exchange adapter.
#[derive(Error, Debug)]
pub enum BinanceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Response decoded but violated the documented shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No market metadata loaded for a symbol
    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BinanceError {
    /// Check if the error is worth retrying at the call site.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BinanceError::Http(_) | BinanceError::WebSocket(_) | BinanceError::InvalidResponse(_)
        )
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, BinanceError>;
