use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::api::StorageApi;
use crate::error::SessionError;
use crate::lock;
use crate::model::{SessionContext, HOME_LABEL};

/// The user's subfolders as listed by `/subdirs`, in server order.
#[derive(Clone)]
pub struct SubfolderStore {
    api: Arc<dyn StorageApi>,
    context: SessionContext,
    names: Arc<Mutex<Vec<String>>>,
}

impl SubfolderStore {
    pub fn new(api: Arc<dyn StorageApi>, context: SessionContext) -> Self {
        Self {
            api,
            context,
            names: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.names).clone()
    }

    /// Re-reads the subfolder list; on failure the list is emptied.
    pub async fn refresh(&self) -> Result<usize, SessionError> {
        match self.api.list_subfolders(&self.context.username).await {
            Ok(names) => {
                let count = names.len();
                *lock(&self.names) = names;
                Ok(count)
            }
            Err(e) => {
                error!("Failed to fetch subdirectories: {}", e);
                lock(&self.names).clear();
                Err(e.into())
            }
        }
    }

    /// Creates a top-level folder and reloads the list.
    pub async fn create(&self, name: &str) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyFolderName);
        }
        // the service will not delete any casing of it either
        if name.eq_ignore_ascii_case(HOME_LABEL) {
            return Err(SessionError::ReservedFolderName(name.to_string()));
        }

        self.api.create_folder(&self.context.username, name).await?;
        info!("Created folder {}", name);
        self.refresh().await?;
        Ok(())
    }

    pub(crate) fn remove_locally(&self, name: &str) {
        lock(&self.names).retain(|n| n != name);
    }
}
