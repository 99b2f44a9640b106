//! Error taxonomy shared by the store, repositories, sessions and the
//! import/export pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("teacher account already exists: {0}")]
    DuplicateAccount(String),

    #[error("invalid credentials")]
    InvalidCredential,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Stable code used on the sidecar wire.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::DuplicateAccount(_) => "duplicate_account",
            Error::InvalidCredential => "invalid_credential",
            Error::InvalidInput(_) => "bad_params",
            Error::Io(_) => "io_failed",
            Error::Format(_) => "format_failed",
            Error::Database(_) => "db_query_failed",
        }
    }
}

impl From<calamine::Error> for Error {
    fn from(e: calamine::Error) -> Self {
        match e {
            calamine::Error::Io(io) => Error::Io(io),
            other => Error::Format(other.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Error::Io(io),
            other => Error::Format(other.to_string()),
        }
    }
}
