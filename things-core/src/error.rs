//! Error abstractions.

use thiserror::Error;

use crate::crd::GroupResource;

/// Application error variants.
#[derive(Debug, Error)]
pub enum AppError {
    /// The named object does not exist in its table.
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: GroupResource, name: String },
    /// An object with the given name already exists in its table.
    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists { resource: GroupResource, name: String },
    /// The requested operation is not supported by this server.
    #[error("{0} not implemented")]
    Unimplemented(String),
    /// The given input was invalid.
    #[error("validation error: {0}")]
    InvalidInput(String),
    /// The server has hit an internal error, but will remain online.
    #[error("internal server error")]
    Ise(anyhow::Error),
}

/// A result type where the error is an `AppError`.
pub type AppResult<T> = ::std::result::Result<T, AppError>;
