use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} returned status {status}")]
    Network { url: String, status: u16 },

    #[error("malformed payload: {0}")]
    Parse(String),

    #[error("row-level persistence failure: {0}")]
    Persistence(String),

    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScraperError {
    /// Transient failures are worth retrying: 5xx responses, timeouts,
    /// connection resets. 4xx and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ScraperError::Http(e) => e.is_timeout() || e.is_connect(),
            ScraperError::Network { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
