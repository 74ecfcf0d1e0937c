use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Store(ci_store::Error),
    Llm(ci_llm::Error),
    CodeIndex(ci_codeindex::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "activity store error: {}", err),
            Error::Llm(err) => write!(f, "llm provider error: {}", err),
            Error::CodeIndex(err) => write!(f, "code index error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Llm(err) => Some(err),
            Error::CodeIndex(err) => Some(err),
        }
    }
}

impl From<ci_store::Error> for Error {
    fn from(err: ci_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<ci_llm::Error> for Error {
    fn from(err: ci_llm::Error) -> Self {
        Error::Llm(err)
    }
}

impl From<ci_codeindex::Error> for Error {
    fn from(err: ci_codeindex::Error) -> Self {
        Error::CodeIndex(err)
    }
}
