use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use crate::api::StorageApi;
use crate::error::Result;
use crate::lock;
use crate::model::{FileEntry, FolderKey, SessionContext};

/// The file set of the active folder, in server order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderListing {
    pub folder: FolderKey,
    pub entries: Vec<FileEntry>,
    pub is_loading: bool,
}

/// What became of a fetch once its response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was applied; carries the number of entries.
    Applied(usize),
    /// A newer fetch started meanwhile and this response was dropped.
    Superseded,
}

#[derive(Default)]
struct ListingState {
    listing: FolderListing,
    // Bumped by every fetch; only the latest one may write the listing.
    generation: u64,
}

/// Owns the active folder and its listing.
#[derive(Clone)]
pub struct FolderListingStore {
    api: Arc<dyn StorageApi>,
    context: SessionContext,
    state: Arc<Mutex<ListingState>>,
}

impl FolderListingStore {
    pub fn new(api: Arc<dyn StorageApi>, context: SessionContext) -> Self {
        Self {
            api,
            context,
            state: Arc::new(Mutex::new(ListingState::default())),
        }
    }

    pub fn snapshot(&self) -> FolderListing {
        lock(&self.state).listing.clone()
    }

    pub fn current_folder(&self) -> FolderKey {
        lock(&self.state).listing.folder.clone()
    }

    /// Switches to `folder` and fetches its listing. The previous entries are
    /// dropped immediately so nothing from the old folder stays visible.
    pub async fn set_folder(&self, folder: FolderKey) -> Result<FetchOutcome> {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.listing = FolderListing {
                folder: folder.clone(),
                entries: Vec::new(),
                is_loading: true,
            };
            state.generation
        };
        info!("Opening folder {}", folder);
        self.fetch(folder, generation).await
    }

    /// Re-fetches the active folder, keeping the current entries on screen
    /// until the response lands.
    pub async fn refresh(&self) -> Result<FetchOutcome> {
        let (folder, generation) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.listing.is_loading = true;
            (state.listing.folder.clone(), state.generation)
        };
        debug!("Refreshing folder {}", folder);
        self.fetch(folder, generation).await
    }

    /// Drops the entry named exactly `name` without asking the server.
    /// A later `refresh` reconciles if the server disagrees.
    pub fn remove_locally(&self, name: &str) -> bool {
        let mut state = lock(&self.state);
        let before = state.listing.entries.len();
        state.listing.entries.retain(|entry| entry.name != name);
        before != state.listing.entries.len()
    }

    async fn fetch(&self, folder: FolderKey, generation: u64) -> Result<FetchOutcome> {
        let result = self.api.list_files(&self.context.username, &folder).await;

        let mut state = lock(&self.state);
        if state.generation != generation || state.listing.folder != folder {
            debug!("Discarding stale listing for {}", folder);
            return Ok(FetchOutcome::Superseded);
        }

        state.listing.is_loading = false;
        match result {
            Ok(entries) => {
                let count = entries.len();
                state.listing.entries = entries;
                debug!("Loaded {} entries for {}", count, folder);
                Ok(FetchOutcome::Applied(count))
            }
            Err(e) => {
                state.listing.entries.clear();
                error!("Error fetching files for {}: {}", folder, e);
                Err(e)
            }
        }
    }
}
