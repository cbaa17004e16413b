use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Fetch failed after {attempts} attempts: {last_error}")]
    FetchExhausted { attempts: usize, last_error: String },

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
