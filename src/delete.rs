use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::api::StorageApi;
use crate::error::SessionError;
use crate::folders::SubfolderStore;
use crate::listing::FolderListingStore;
use crate::lock;
use crate::model::{FolderKey, SessionContext};

/// A deletion waiting for the user's confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingDeletion {
    #[default]
    None,
    File { folder: FolderKey, name: String },
    Folder(String),
}

impl PendingDeletion {
    pub fn is_pending(&self) -> bool {
        !matches!(self, PendingDeletion::None)
    }

    /// Text for the confirmation dialog.
    pub fn message(&self) -> Option<String> {
        match self {
            PendingDeletion::None => None,
            PendingDeletion::File { name, .. } => {
                Some(format!("Are you sure you want to delete \"{}\"?", name))
            }
            PendingDeletion::Folder(folder) => Some(format!(
                "Are you sure you want to delete the folder \"{}\"?",
                folder
            )),
        }
    }
}

/// What a confirmed deletion removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    File(String),
    Folder(String),
}

/// Confirmation-gated deletion of a file or of the active folder.
#[derive(Clone)]
pub struct DeleteWorkflow {
    api: Arc<dyn StorageApi>,
    context: SessionContext,
    listing: FolderListingStore,
    folders: SubfolderStore,
    pending: Arc<Mutex<PendingDeletion>>,
}

impl DeleteWorkflow {
    pub fn new(
        api: Arc<dyn StorageApi>,
        context: SessionContext,
        listing: FolderListingStore,
        folders: SubfolderStore,
    ) -> Self {
        Self {
            api,
            context,
            listing,
            folders,
            pending: Arc::new(Mutex::new(PendingDeletion::None)),
        }
    }

    pub fn pending(&self) -> PendingDeletion {
        lock(&self.pending).clone()
    }

    /// Asks for confirmation to delete `name` from the active folder.
    pub fn request_file_deletion(&self, name: &str) -> Result<(), SessionError> {
        let folder = self.listing.current_folder();
        self.set_pending(PendingDeletion::File {
            folder,
            name: name.to_string(),
        })
    }

    /// Asks for confirmation to delete the active folder. Home is refused.
    pub fn request_folder_deletion(&self) -> Result<(), SessionError> {
        match self.listing.current_folder() {
            FolderKey::Home => Err(SessionError::HomeNotDeletable),
            FolderKey::Named(name) => self.set_pending(PendingDeletion::Folder(name)),
        }
    }

    fn set_pending(&self, target: PendingDeletion) -> Result<(), SessionError> {
        let mut pending = lock(&self.pending);
        if pending.is_pending() {
            return Err(SessionError::DeletionAlreadyPending);
        }
        *pending = target;
        Ok(())
    }

    pub fn cancel(&self) {
        *lock(&self.pending) = PendingDeletion::None;
    }

    /// Performs the pending deletion. The pending state is cleared whatever
    /// the result; `Ok(None)` when nothing was pending.
    pub async fn confirm(&self) -> Result<Option<DeletionOutcome>, SessionError> {
        let target = std::mem::take(&mut *lock(&self.pending));

        match target {
            PendingDeletion::None => Ok(None),
            PendingDeletion::File { folder, name } => {
                if let Err(e) = self
                    .api
                    .delete_file(&self.context.username, &folder, &name)
                    .await
                {
                    error!("Failed to delete file {}: {}", name, e);
                    return Err(e.into());
                }
                info!("Deleted {} from {}", name, folder);

                if self.listing.current_folder() == folder {
                    self.listing.remove_locally(&name);
                }
                Ok(Some(DeletionOutcome::File(name)))
            }
            PendingDeletion::Folder(folder) => {
                if let Err(e) = self.api.delete_folder(&self.context.username, &folder).await {
                    error!("Failed to delete folder {}: {}", folder, e);
                    return Err(e.into());
                }
                info!("Deleted folder {}", folder);

                self.folders.remove_locally(&folder);
                if let Err(e) = self.folders.refresh().await {
                    warn!("Subfolder refresh after delete failed: {}", e);
                }
                if let Err(e) = self.listing.set_folder(FolderKey::Home).await {
                    warn!("Could not load Home after deleting {}: {}", folder, e);
                }
                Ok(Some(DeletionOutcome::Folder(folder)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, FakeApi};

    struct Fixture {
        api: Arc<FakeApi>,
        listing: FolderListingStore,
        folders: SubfolderStore,
        deletes: DeleteWorkflow,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(FakeApi::new());
        let context = SessionContext::new("alice");
        let listing = FolderListingStore::new(api.clone(), context.clone());
        let folders = SubfolderStore::new(api.clone(), context.clone());
        let deletes = DeleteWorkflow::new(api.clone(), context, listing.clone(), folders.clone());
        Fixture {
            api,
            listing,
            folders,
            deletes,
        }
    }

    #[tokio::test]
    async fn test_confirmed_file_delete_removes_only_that_entry() {
        let f = fixture();
        f.api.put_files(
            &FolderKey::Home,
            vec![entry("a.txt", 1), entry("b.txt", 2), entry("a.txt.old", 3)],
        );
        f.listing.set_folder(FolderKey::Home).await.unwrap();

        f.deletes.request_file_deletion("a.txt").unwrap();
        assert_eq!(
            f.deletes.pending().message().unwrap(),
            "Are you sure you want to delete \"a.txt\"?"
        );

        let outcome = f.deletes.confirm().await.unwrap();

        assert_eq!(outcome, Some(DeletionOutcome::File("a.txt".to_string())));
        assert_eq!(f.deletes.pending(), PendingDeletion::None);
        assert_eq!(
            f.listing.snapshot().entries,
            vec![entry("b.txt", 2), entry("a.txt.old", 3)]
        );
        // removal is local; no listing round trip
        assert_eq!(f.api.calls().iter().filter(|c| c.starts_with("list")).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_file_delete_leaves_listing() {
        let f = fixture();
        f.api.put_files(&FolderKey::Home, vec![entry("a.txt", 1)]);
        f.api.fail_name("a.txt");
        f.listing.set_folder(FolderKey::Home).await.unwrap();

        f.deletes.request_file_deletion("a.txt").unwrap();
        let err = f.deletes.confirm().await.unwrap_err();

        assert!(matches!(err, SessionError::Api(_)));
        assert_eq!(f.listing.snapshot().entries, vec![entry("a.txt", 1)]);
        assert_eq!(f.deletes.pending(), PendingDeletion::None);
    }

    #[tokio::test]
    async fn test_cancel_makes_no_call() {
        let f = fixture();
        f.deletes.request_file_deletion("a.txt").unwrap();
        f.deletes.cancel();

        assert_eq!(f.deletes.confirm().await.unwrap(), None);
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_request_while_pending_is_rejected() {
        let f = fixture();
        f.deletes.request_file_deletion("a.txt").unwrap();

        assert!(matches!(
            f.deletes.request_file_deletion("b.txt"),
            Err(SessionError::DeletionAlreadyPending)
        ));
        assert_eq!(
            f.deletes.pending(),
            PendingDeletion::File {
                folder: FolderKey::Home,
                name: "a.txt".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_home_cannot_be_deleted() {
        let f = fixture();
        f.listing.set_folder(FolderKey::Home).await.unwrap();

        assert!(matches!(
            f.deletes.request_folder_deletion(),
            Err(SessionError::HomeNotDeletable)
        ));
        assert!(!f.deletes.pending().is_pending());
    }

    #[tokio::test]
    async fn test_confirmed_folder_delete_returns_home() {
        let f = fixture();
        let photos = FolderKey::parse("Photos");
        f.api.put_subfolders(&["Photos", "Docs"]);
        f.api.put_files(&photos, vec![entry("cat.jpg", 5)]);
        f.api.put_files(&FolderKey::Home, vec![entry("notes.txt", 1)]);
        f.folders.refresh().await.unwrap();
        f.listing.set_folder(photos).await.unwrap();

        f.deletes.request_folder_deletion().unwrap();
        assert_eq!(
            f.deletes.pending().message().unwrap(),
            "Are you sure you want to delete the folder \"Photos\"?"
        );
        let outcome = f.deletes.confirm().await.unwrap();

        assert_eq!(outcome, Some(DeletionOutcome::Folder("Photos".to_string())));
        assert_eq!(f.folders.names(), ["Docs"]);
        let listing = f.listing.snapshot();
        assert_eq!(listing.folder, FolderKey::Home);
        assert_eq!(listing.entries, vec![entry("notes.txt", 1)]);
    }

    #[tokio::test]
    async fn test_failed_folder_delete_keeps_folder() {
        let f = fixture();
        let photos = FolderKey::parse("Photos");
        f.api.put_subfolders(&["Photos"]);
        f.api.fail_name("Photos");
        f.folders.refresh().await.unwrap();
        f.listing.set_folder(photos.clone()).await.unwrap();

        f.deletes.request_folder_deletion().unwrap();
        assert!(f.deletes.confirm().await.is_err());

        assert_eq!(f.listing.current_folder(), photos);
        assert_eq!(f.folders.names(), ["Photos"]);
    }
}
