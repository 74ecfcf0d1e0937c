use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    WalkDir(walkdir::Error),
    Database(rusqlite::Error),
    DimensionMismatch { expected: usize, got: usize },
    Embedding(ci_llm::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::WalkDir(err) => write!(f, "directory walk error: {}", err),
            Error::Database(err) => write!(f, "vector store error: {}", err),
            Error::DimensionMismatch { expected, got } => {
                write!(f, "embedding dimension mismatch: store expects {}, got {}", expected, got)
            }
            Error::Embedding(err) => write!(f, "embedding provider error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Database(err) => Some(err),
            Error::DimensionMismatch { .. } => None,
            Error::Embedding(err) => Some(err),
        }
    }
}

impl From<ci_llm::Error> for Error {
    fn from(err: ci_llm::Error) -> Self {
        Error::Embedding(err)
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

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}
