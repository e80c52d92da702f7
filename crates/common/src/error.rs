use thiserror::Error;

/// Coarse classification every error collapses to when it is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Invalid,
    NotFound,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Invalid => write!(f, "INVALID"),
            ErrorKind::NotFound => write!(f, "NOT_FOUND"),
            ErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Invalid(_) | Error::Config(_) => ErrorKind::Invalid,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Internal(_)
            | Error::Exchange(_)
            | Error::Http(_)
            | Error::Json(_)
            | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Re-tag an error as `Internal`, keeping the original message as the cause.
    pub fn internal(context: &str, cause: Error) -> Self {
        Error::Internal(format!("{context}: {cause}"))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
