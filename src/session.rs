//! The storage session: one user's view of the service, composed of the
//! listing, upload, delete and subfolder components.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::api::{StorageApi, UploadSource};
use crate::config::Config;
use crate::delete::{DeleteWorkflow, DeletionOutcome, PendingDeletion};
use crate::error::SessionError;
use crate::folders::SubfolderStore;
use crate::listing::{FetchOutcome, FolderListing, FolderListingStore};
use crate::model::{ActivityRecord, FolderKey, SessionContext};
use crate::upload::{BatchReport, UploadCoordinator, UploadItem};

/// Receives downloaded bytes; where they end up is the shell's business.
pub trait DownloadSink: Send + Sync {
    fn save(&self, name: &str, data: &[u8]) -> std::io::Result<PathBuf>;
}

/// Saves downloads under their own name inside a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        // Server-supplied names must not escape the target directory.
        let file_name = Path::new(name).file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot save a file named {:?}", name),
            )
        })?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

/// Saves a download to one chosen path, e.g. from a save dialog.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DownloadSink for FileSink {
    fn save(&self, _name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::write(&self.path, data)?;
        Ok(self.path.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub upload_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            upload_grace: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            upload_grace: config.upload_grace(),
        }
    }
}

/// Everything a shell needs to render the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub listing: FolderListing,
    pub uploads: Vec<UploadItem>,
    pub pending_deletion: PendingDeletion,
    pub subfolders: Vec<String>,
}

#[derive(Clone)]
pub struct StorageSession {
    api: Arc<dyn StorageApi>,
    context: SessionContext,
    listing: FolderListingStore,
    uploads: UploadCoordinator,
    deletes: DeleteWorkflow,
    folders: SubfolderStore,
}

impl StorageSession {
    pub fn new(api: Arc<dyn StorageApi>, context: SessionContext, options: SessionOptions) -> Self {
        let listing = FolderListingStore::new(api.clone(), context.clone());
        let folders = SubfolderStore::new(api.clone(), context.clone());
        let uploads = UploadCoordinator::new(
            api.clone(),
            context.clone(),
            listing.clone(),
            options.upload_grace,
        );
        let deletes = DeleteWorkflow::new(api.clone(), context.clone(), listing.clone(), folders.clone());

        Self {
            api,
            context,
            listing,
            uploads,
            deletes,
            folders,
        }
    }

    pub fn username(&self) -> &str {
        &self.context.username
    }

    /// Loads the subfolder list and the Home listing. Failures are logged by
    /// the components and leave their state empty.
    pub async fn open(&self) {
        info!("Opening session for {}", self.context.username);
        let (_, _) = tokio::join!(self.folders.refresh(), self.listing.set_folder(FolderKey::Home));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            listing: self.listing.snapshot(),
            uploads: self.uploads.items(),
            pending_deletion: self.deletes.pending(),
            subfolders: self.folders.names(),
        }
    }

    pub fn current_folder(&self) -> FolderKey {
        self.listing.current_folder()
    }

    pub async fn select_folder(&self, folder: FolderKey) -> Result<FetchOutcome, SessionError> {
        Ok(self.listing.set_folder(folder).await?)
    }

    pub async fn refresh(&self) -> Result<FetchOutcome, SessionError> {
        Ok(self.listing.refresh().await?)
    }

    /// Uploads into the active folder.
    pub async fn upload_files(&self, files: Vec<UploadSource>) -> BatchReport {
        let destination = self.listing.current_folder();
        self.uploads.start_batch(files, destination).await
    }

    /// Asks for confirmation to delete `name`; see [`Self::confirm_deletion`].
    pub fn delete_file(&self, name: &str) -> Result<(), SessionError> {
        self.deletes.request_file_deletion(name)
    }

    /// Asks for confirmation to delete the active folder.
    pub fn delete_current_folder(&self) -> Result<(), SessionError> {
        self.deletes.request_folder_deletion()
    }

    pub async fn confirm_deletion(&self) -> Result<Option<DeletionOutcome>, SessionError> {
        self.deletes.confirm().await
    }

    pub fn cancel_deletion(&self) {
        self.deletes.cancel()
    }

    /// Fetches `name` from the active folder and hands it to `sink`.
    /// Leaves the session state untouched.
    pub async fn download_file(
        &self,
        name: &str,
        sink: &dyn DownloadSink,
    ) -> Result<PathBuf, SessionError> {
        let folder = self.listing.current_folder();
        let data = self
            .api
            .download_file(&self.context.username, &folder, name)
            .await
            .map_err(|e| {
                error!("Download error for {}: {}", name, e);
                SessionError::from(e)
            })?;

        let path = sink.save(name, &data).map_err(|e| {
            error!("Could not save {}: {}", name, e);
            SessionError::Save(e)
        })?;
        info!("Downloaded {} ({} bytes) to {}", name, data.len(), path.display());
        Ok(path)
    }

    pub async fn create_folder(&self, name: &str) -> Result<(), SessionError> {
        self.folders.create(name).await
    }

    pub async fn refresh_subfolders(&self) -> Result<usize, SessionError> {
        self.folders.refresh().await
    }

    pub async fn activity_log(&self) -> Result<Vec<ActivityRecord>, SessionError> {
        self.api
            .activity_log(&self.context.username)
            .await
            .map_err(|e| {
                error!("Failed to fetch activity log: {}", e);
                SessionError::from(e)
            })
    }
}
