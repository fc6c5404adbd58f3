//! Error types for the storage client and session core.

use thiserror::Error;

/// Failure talking to the storage service.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (connection refused, timeout, broken body).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a JSON body carrying an `error` field.
    #[error("Server error: {0}")]
    Server(String),

    /// Non-success status without a usable error body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Base URL cannot carry path segments (e.g. `mailto:`).
    #[error("Base URL cannot be used for requests: {0}")]
    InvalidBaseUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a session operation.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("A deletion is already awaiting confirmation")]
    DeletionAlreadyPending,

    #[error("The Home folder cannot be deleted")]
    HomeNotDeletable,

    #[error("Folder name required")]
    EmptyFolderName,

    #[error("\"{0}\" is reserved for the root folder")]
    ReservedFolderName(String),

    #[error("Failed to save download: {0}")]
    Save(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;
