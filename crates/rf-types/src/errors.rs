use thiserror::Error;

/// Main error type for Riskfold
#[derive(Error, Debug)]
pub enum RfError {
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RfError {
    /// True for caller-input problems that should be reported back as
    /// `{"error": ...}` rather than treated as a server fault.
    pub fn is_validation(&self) -> bool {
        matches!(self, RfError::Validation(_))
    }
}

/// Market feed errors. These never cross into the scoring pipeline; the feed
/// boundary turns them into a neutral snapshot.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Request failed: {message}")]
    Request { message: String },

    #[error("Upstream returned status {status} for {identifier}")]
    Status { identifier: String, status: u16 },

    #[error("No data for ISIN {identifier}")]
    NoData { identifier: String },

    #[error("Unparseable payload: {message}")]
    Payload { message: String },

    #[error("Timed out after {timeout_seconds} seconds fetching {identifier}")]
    Timeout {
        identifier: String,
        timeout_seconds: u64,
    },
}

/// Result type alias for Riskfold operations
pub type RfResult<T> = Result<T, RfError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::RfError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::RfError::Config(format!($($arg)*))
    };
}
