/*!
 * Error types for the treelingo library.
 *
 * Every failure surfaced by the pipeline is an [`Error`] carrying an [`ErrorKind`],
 * a message, an optional cause and free-form diagnostic context. Completion
 * providers report failures through the narrower [`ProviderError`], which converts
 * into an [`Error`] of kind [`ErrorKind::Provider`].
 */

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause of an error
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when working with completion providers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Category of a library error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad pattern, option or input document
    Validation,
    /// File system failure
    Io,
    /// Completion service failure
    Provider,
    /// Response parse or format-preservation failure
    Format,
    /// Terminology detection or persistence failure
    Terminology,
    /// Batch or run-level failure
    Translation,
}

impl ErrorKind {
    /// Short lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Io => "io",
            Self::Provider => "provider",
            Self::Format => "format",
            Self::Terminology => "terminology",
            Self::Translation => "translation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main library error
#[derive(Error, Debug)]
#[error("{kind} error: {message}{}", format_context(.context))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<BoxedCause>,
    context: Vec<(String, String)>,
}

fn format_context(context: &[(String, String)]) -> String {
    if context.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = context.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!(" [{}]", pairs.join(", "))
}

impl Error {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            context: Vec::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, message)
    }

    pub fn terminology(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Terminology, message)
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Translation, message)
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: impl Into<BoxedCause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attach a diagnostic key/value pair
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Look up a context value by key
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a batch attempt that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Provider | ErrorKind::Format)
    }
}

impl From<ProviderError> for Error {
    fn from(error: ProviderError) -> Self {
        Self::new(ErrorKind::Provider, error.to_string()).with_cause(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, error.to_string()).with_cause(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        let kind = if error.is_io() {
            ErrorKind::Io
        } else {
            ErrorKind::Validation
        };
        Self::new(kind, format!("Invalid JSON: {}", error)).with_cause(error)
    }
}
