use serde::Serialize;
use thiserror::Error;

/// Error types for data-fetching operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("API error: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimit { retry_after: u64 },

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("No data available for {symbol} from {provider}")]
    NoData { symbol: String, provider: String },

    #[error("Timeout error: operation took longer than {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("Data validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;

/// Category tag carried by structured error records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    Validation,
    Network,
    NotFound,
    Config,
    Unknown,
}

/// Caller-facing error record. Messages never carry credentials, request
/// URLs, or raw upstream response bodies.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl DataError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::Network(_) => true,
            DataError::RateLimit { .. } => true,
            DataError::Timeout { .. } => true,
            DataError::Api { status_code, .. } => {
                // Retry on server errors (5xx) and rate limiting (429)
                *status_code >= 500 || *status_code == 429
            }
            _ => false,
        }
    }

    /// Get retry delay in seconds for retryable errors
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            DataError::RateLimit { retry_after } => Some(*retry_after),
            DataError::Network(_) => Some(1),
            DataError::Timeout { .. } => Some(2),
            DataError::Api { status_code, .. } if *status_code >= 500 => Some(5),
            _ => None,
        }
    }

    /// Convert to a structured record safe to hand back to the caller.
    /// Network failures collapse to a generic message: reqwest errors can
    /// embed the full request URL, which may include an API key.
    pub fn to_record(&self) -> ErrorRecord {
        match self {
            DataError::RateLimit { retry_after } => ErrorRecord {
                kind: ErrorKind::RateLimit,
                message: format!("Rate limit exceeded, retry after {} seconds", retry_after),
            },
            DataError::Validation { field, message } => ErrorRecord {
                kind: ErrorKind::Validation,
                message: format!("Invalid {}: {}", field, message),
            },
            DataError::InvalidSymbol(symbol) => ErrorRecord {
                kind: ErrorKind::Validation,
                message: format!("Invalid symbol: {}", symbol),
            },
            DataError::Network(_) => ErrorRecord {
                kind: ErrorKind::Network,
                message: "Network error. Please try again later.".to_string(),
            },
            DataError::Timeout { timeout_seconds } => ErrorRecord {
                kind: ErrorKind::Network,
                message: format!("Request timed out after {}s", timeout_seconds),
            },
            DataError::Api { status_code, .. } if *status_code == 429 => ErrorRecord {
                kind: ErrorKind::RateLimit,
                message: "Provider rate limit hit, retry later".to_string(),
            },
            DataError::Api { status_code, .. } => ErrorRecord {
                kind: ErrorKind::Network,
                message: format!("Provider returned HTTP {}", status_code),
            },
            DataError::NoData { symbol, provider } => ErrorRecord {
                kind: ErrorKind::NotFound,
                message: format!("No data available for {} from {}", symbol, provider),
            },
            DataError::Config(message) => ErrorRecord {
                kind: ErrorKind::Config,
                message: message.clone(),
            },
            DataError::Parse { .. } | DataError::Serialization(_) | DataError::Internal(_) => {
                ErrorRecord {
                    kind: ErrorKind::Unknown,
                    message: "An unexpected error occurred.".to_string(),
                }
            }
        }
    }

    /// Create a parse error with context
    pub fn parse_error<S: Into<String>>(message: S) -> Self {
        DataError::Parse {
            message: message.into(),
        }
    }

    /// Create a validation error with field context
    pub fn validation_error<S: Into<String>>(field: S, message: S) -> Self {
        DataError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an API error with status code
    pub fn api_error<S: Into<String>>(status_code: u16, message: S) -> Self {
        DataError::Api {
            status_code,
            message: message.into(),
        }
    }

    pub fn no_data<S: Into<String>>(symbol: S, provider: S) -> Self {
        DataError::NoData {
            symbol: symbol.into(),
            provider: provider.into(),
        }
    }
}

/// Mask an API key inside a URL before logging it
pub fn redact_key(url: &str, key: &str) -> String {
    if key.is_empty() {
        url.to_string()
    } else {
        url.replace(key, "***")
    }
}
