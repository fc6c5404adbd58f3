//! Client for a personal file-storage service: folder browsing, concurrent
//! uploads with progress, confirmation-gated deletes, downloads and the
//! activity log, kept in sync with the service's HTTP API.

pub mod api;
pub mod config;
pub mod delete;
pub mod error;
pub mod folders;
pub mod listing;
pub mod model;
pub mod progress;
pub mod session;
pub mod upload;

#[cfg(test)]
mod testing;

pub use api::{HttpStorageClient, StorageApi, UploadSource};
pub use error::{ApiError, SessionError};
pub use model::{FileEntry, FolderKey, SessionContext};
pub use session::{SessionOptions, SessionSnapshot, StorageSession};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks shared session state, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
