use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Core(ci_core::Error),
    Store(ci_store::Error),
    CodeIndex(ci_codeindex::Error),
    Llm(ci_llm::Error),
    Engine(ci_engine::Error),
    Providers(ci_providers::error::Error),
    /// No free port in the daemon's reserved range after the scan budget.
    NoPortAvailable,
    /// Another process already holds the daemon lock for this project.
    AlreadyRunning,
    Validation(String),
    NotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Core(err) => write!(f, "core error: {}", err),
            Error::Store(err) => write!(f, "activity store error: {}", err),
            Error::CodeIndex(err) => write!(f, "code index error: {}", err),
            Error::Llm(err) => write!(f, "llm provider error: {}", err),
            Error::Engine(err) => write!(f, "engine error: {}", err),
            Error::Providers(err) => write!(f, "provider error: {}", err),
            Error::NoPortAvailable => write!(f, "no free port in the daemon port range"),
            Error::AlreadyRunning => write!(f, "daemon is already running for this project"),
            Error::Validation(msg) => write!(f, "validation error: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::CodeIndex(err) => Some(err),
            Error::Llm(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Providers(err) => Some(err),
            Error::NoPortAvailable | Error::AlreadyRunning | Error::Validation(_) | Error::NotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ci_core::Error> for Error {
    fn from(err: ci_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<ci_store::Error> for Error {
    fn from(err: ci_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<ci_codeindex::Error> for Error {
    fn from(err: ci_codeindex::Error) -> Self {
        Error::CodeIndex(err)
    }
}

impl From<ci_llm::Error> for Error {
    fn from(err: ci_llm::Error) -> Self {
        Error::Llm(err)
    }
}

impl From<ci_engine::Error> for Error {
    fn from(err: ci_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<ci_providers::error::Error> for Error {
    fn from(err: ci_providers::error::Error) -> Self {
        Error::Providers(err)
    }
}

/// REST error mapping (spec §7): validation → 400, not-found → 404,
/// everything else → 500. Hook routes never let an `Error` reach this —
/// they catch at the handler boundary and return a success response with
/// empty context instead.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyRunning => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
