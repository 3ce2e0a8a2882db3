use miette::Diagnostic;
use thiserror::Error;

/// Result type for analyzer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the unused value analyzer
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum Error {
    #[error("I/O error: {0}")]
    #[diagnostic(code(unused_values::io_error))]
    Io(String),

    #[error("Analysis was cancelled")]
    #[diagnostic(code(unused_values::cancelled))]
    Cancelled,

    #[error("Invalid input: {message}")]
    #[diagnostic(code(unused_values::invalid_input))]
    InvalidInput { message: String },

    #[error("Usage solver failed: {message}")]
    #[diagnostic(code(unused_values::solver_error))]
    Solver { message: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(unused_values::config_error))]
    Config { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(unused_values::internal_error))]
    Internal { message: String },
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a solver error
    pub fn solver(message: impl Into<String>) -> Self {
        Error::Solver {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput {
            message: format!("malformed JSON: {}", err),
        }
    }
}
