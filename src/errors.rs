use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhoisError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Unsupported TLD: {0}")]
    UnsupportedTld(String),

    #[error("Could not establish connection to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Empty whois response")]
    EmptyResponse,

    #[error("Lookup timed out or was canceled")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] tokio::io::Error),

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("Whois server database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures while loading or replacing the suffix to server table.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("empty whois server database")]
    Empty,

    #[error("empty whois server for suffix {0:?}")]
    EmptyServer(String),

    #[error("malformed whois server database: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed public suffix list: {0}")]
    SuffixList(String),
}

impl From<tokio::time::error::Elapsed> for WhoisError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        WhoisError::Timeout
    }
}

impl WhoisError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WhoisError::InvalidDomain(_) => "invalid_domain",
            WhoisError::UnsupportedTld(_) => "unsupported_tld",
            WhoisError::ConnectionFailed { .. } => "connection_failed",
            WhoisError::EmptyResponse => "empty_response",
            WhoisError::Timeout => "timeout",
            WhoisError::IoError(_) => "io_error",
            WhoisError::ResponseTooLarge => "response_too_large",
            WhoisError::Database(_) => "database",
            WhoisError::InvalidProxy(_) => "invalid_proxy",
            WhoisError::ConfigError(_) => "config",
            WhoisError::Internal(_) => "internal",
        }
    }
}
