//! Error types for CLI operations

use std::fmt;

use thiserror::Error;

use fleetpush_client::ClientError;
use fleetpush_protocol::ProtocolError;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors with context for the user
#[derive(Error, Debug)]
pub enum CliError {
    /// Client or transport failure
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Invalid wire value (role, kind, frame)
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get user-friendly suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Client(ClientError::Transport(e)) if e.is_fatal() => vec![
                "Check if the server is running",
                "Verify the URL passed with --server-url or FLEETPUSH_SERVER_URL",
            ],
            Self::Client(ClientError::Timeout { .. }) => vec![
                "Check server responsiveness",
                "Raise request_timeout_ms in the config file",
            ],
            Self::Client(ClientError::MaxReconnectAttemptsExceeded { .. }) => {
                vec!["Check network connectivity", "Restart the listener"]
            }
            Self::Client(ClientError::InvalidTopic) => vec!["Pass a non-empty topic name"],
            Self::Client(ClientError::ReservedTopic(_)) => {
                vec!["Personal and role broadcast topics are always received by listen"]
            }
            Self::InvalidArguments(_) | Self::Json(_) => vec![
                "Check argument format (must be valid JSON)",
                "Use --help to see expected format",
            ],
            Self::Config(_) | Self::Client(ClientError::Config(_)) => vec![
                "Check the file passed with --config",
                "Check FLEETPUSH_* environment variables",
            ],
            _ => vec![],
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Client(err) => match err {
                ClientError::Transport(_)
                | ClientError::NotReady { .. }
                | ClientError::MaxReconnectAttemptsExceeded { .. }
                | ClientError::ClientClosed => ErrorCategory::Connection,
                ClientError::Timeout { .. } => ErrorCategory::Timeout,
                ClientError::Server(_) | ClientError::Rejected { .. } => ErrorCategory::Server,
                ClientError::Protocol(_) => ErrorCategory::Parsing,
                ClientError::Config(_) => ErrorCategory::Config,
                ClientError::InvalidTopic
                | ClientError::ReservedTopic(_)
                | ClientError::RequestInFlight { .. } => {
                    ErrorCategory::User
                }
                _ => ErrorCategory::Other,
            },
            Self::Protocol(_) | Self::InvalidArguments(_) => ErrorCategory::User,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Io(_) => ErrorCategory::System,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other(_) => ErrorCategory::Other,
        }
    }
}

/// Broad classes of failure, used to label error output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    User,
    Server,
    Timeout,
    Parsing,
    System,
    Config,
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "Connection"),
            Self::User => write!(f, "User Input"),
            Self::Server => write!(f, "Server"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Parsing => write!(f, "Parsing"),
            Self::System => write!(f, "System"),
            Self::Config => write!(f, "Configuration"),
            Self::Other => write!(f, "Other"),
        }
    }
}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
