use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for SDK operations.
#[derive(Debug)]
pub enum Error {
    /// Resource not found (session, batch, etc.).
    NotFound(String),
    /// Invalid input parameters or configuration.
    InvalidInput(String),
    /// The daemon could not be reached, or returned a non-success status.
    Daemon(reqwest::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Daemon(err) => write!(f, "daemon request failed: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Daemon(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Daemon(err)
    }
}
