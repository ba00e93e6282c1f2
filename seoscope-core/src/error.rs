use seoscope_scanner::ScanError;
use thiserror::Error;

/// Failure talking to a third-party data provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, ProviderError::NotConfigured(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ProviderError::Malformed(_))
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no usable provider for mode '{mode}': {reason}")]
    NoUsableProvider { mode: String, reason: String },

    #[error("crawl failed: {0}")]
    Scan(#[from] ScanError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
