use thiserror::Error;

/// Errors surfaced by the gateway facades.
///
/// Every facade call either returns the remote payload or exactly one of
/// these variants; remote failures are classified, never retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication or authorization failure reported by the remote
    /// service (bad credentials, missing session, row policy denial).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A lookup expected a matching row but found none.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The remote service rejected a write as invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A row read or write failed at the persistence layer.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A file upload or removal failed at the storage service.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
