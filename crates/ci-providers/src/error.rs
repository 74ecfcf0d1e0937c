use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    WalkDir(walkdir::Error),
    /// An agent has no registered manifest.
    UnknownAgent(String),
    /// The plan-content resolver exhausted every strategy.
    NoPlanContent(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::WalkDir(err) => write!(f, "directory traversal error: {}", err),
            Error::UnknownAgent(name) => write!(f, "unknown agent: {}", name),
            Error::NoPlanContent(session_id) => {
                write!(f, "no plan content resolvable for session {}", session_id)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::UnknownAgent(_) | Error::NoPlanContent(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err)
    }
}
