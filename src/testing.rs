//! Scripted in-memory `StorageApi` for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::api::{ProgressCallback, StorageApi, UploadSource};
use crate::error::{ApiError, Result};
use crate::model::{ActivityRecord, FileEntry, FolderKey};

pub(crate) fn created() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub(crate) fn entry(name: &str, size: u64) -> FileEntry {
    FileEntry {
        name: name.to_string(),
        size,
        created: created(),
    }
}

#[derive(Default)]
pub(crate) struct FakeApi {
    files: Mutex<HashMap<FolderKey, Vec<FileEntry>>>,
    subfolders: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<FolderKey, VecDeque<oneshot::Receiver<()>>>>,
    upload_gates: Mutex<HashMap<String, VecDeque<oneshot::Receiver<Result<()>>>>>,
    failing_listings: Mutex<HashSet<FolderKey>>,
    failing_names: Mutex<HashSet<String>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put_files(&self, folder: &FolderKey, entries: Vec<FileEntry>) {
        self.files.lock().unwrap().insert(folder.clone(), entries);
    }

    pub(crate) fn files(&self, folder: &FolderKey) -> Vec<FileEntry> {
        self.files.lock().unwrap().get(folder).cloned().unwrap_or_default()
    }

    pub(crate) fn put_subfolders(&self, names: &[&str]) {
        *self.subfolders.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
        let mut files = self.files.lock().unwrap();
        for name in names {
            files.entry(FolderKey::subfolder(name)).or_default();
        }
    }

    /// Holds the next listing of `folder` until the returned sender fires.
    pub(crate) fn gate(&self, folder: &FolderKey) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .entry(folder.clone())
            .or_default()
            .push_back(rx);
        tx
    }

    /// Holds the next upload of `name` at half progress until the returned
    /// sender fires; the value sent decides how the upload ends.
    pub(crate) fn gate_upload(&self, name: &str) -> oneshot::Sender<Result<()>> {
        let (tx, rx) = oneshot::channel();
        self.upload_gates
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub(crate) fn fail_listing(&self, folder: &FolderKey) {
        self.failing_listings.lock().unwrap().insert(folder.clone());
    }

    /// Uploads, deletes and downloads of `name` (file or folder) fail.
    pub(crate) fn fail_name(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.failing_names.lock().unwrap().contains(name) {
            return Err(ApiError::Server(format!("{} is locked", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageApi for FakeApi {
    async fn list_files(&self, username: &str, folder: &FolderKey) -> Result<Vec<FileEntry>> {
        self.record(format!("list {} as {}", folder, username));
        let gate = self.gates.lock().unwrap().get_mut(folder).and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.failing_listings.lock().unwrap().contains(folder) {
            return Err(ApiError::Server("Directory not found".to_string()));
        }
        Ok(self.files(folder))
    }

    async fn upload_file(
        &self,
        _username: &str,
        folder: &FolderKey,
        file: UploadSource,
        progress: ProgressCallback,
    ) -> Result<()> {
        self.record(format!("upload {} to {}", file.name, folder));
        progress(file.size / 2, file.size);
        let gate = self
            .upload_gates
            .lock()
            .unwrap()
            .get_mut(&file.name)
            .and_then(VecDeque::pop_front);
        match gate {
            Some(gate) => gate.await.unwrap_or(Ok(()))?,
            None => tokio::task::yield_now().await,
        }
        self.check_name(&file.name)?;
        progress(file.size, file.size);

        let mut files = self.files.lock().unwrap();
        let entries = files.entry(folder.clone()).or_default();
        entries.retain(|e| e.name != file.name);
        entries.push(entry(&file.name, file.size));
        Ok(())
    }

    async fn download_file(&self, _username: &str, folder: &FolderKey, name: &str) -> Result<Bytes> {
        self.record(format!("download {} from {}", name, folder));
        self.check_name(name)?;
        if !self.files(folder).iter().any(|e| e.name == name) {
            return Err(ApiError::Server("File not found".to_string()));
        }
        Ok(Bytes::from(format!("contents of {}", name)))
    }

    async fn delete_file(&self, _username: &str, folder: &FolderKey, name: &str) -> Result<()> {
        self.record(format!("delete {} from {}", name, folder));
        self.check_name(name)?;
        let mut files = self.files.lock().unwrap();
        let entries = files.entry(folder.clone()).or_default();
        let before = entries.len();
        entries.retain(|e| e.name != name);
        if entries.len() == before {
            return Err(ApiError::Server("File not found".to_string()));
        }
        Ok(())
    }

    async fn delete_folder(&self, _username: &str, folder: &str) -> Result<()> {
        self.record(format!("delete folder {}", folder));
        self.check_name(folder)?;
        self.subfolders.lock().unwrap().retain(|n| n != folder);
        self.files.lock().unwrap().remove(&FolderKey::subfolder(folder));
        Ok(())
    }

    async fn list_subfolders(&self, _username: &str) -> Result<Vec<String>> {
        self.record("subdirs".to_string());
        Ok(self.subfolders.lock().unwrap().clone())
    }

    async fn create_folder(&self, _username: &str, name: &str) -> Result<()> {
        self.record(format!("create folder {}", name));
        let mut subfolders = self.subfolders.lock().unwrap();
        if subfolders.iter().any(|n| n == name) {
            return Err(ApiError::Server("Folder already exists".to_string()));
        }
        subfolders.push(name.to_string());
        Ok(())
    }

    async fn activity_log(&self, username: &str) -> Result<Vec<ActivityRecord>> {
        self.record(format!("activity as {}", username));
        Ok(vec![ActivityRecord {
            action: "upload".to_string(),
            filename: "a.txt".to_string(),
            timestamp: created(),
        }])
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.record(format!("login {}", username));
        if password != "secret" {
            return Err(ApiError::Server("Invalid username or password".to_string()));
        }
        Ok(())
    }

    async fn register(&self, username: &str, _password: &str) -> Result<()> {
        self.record(format!("register {}", username));
        Ok(())
    }
}
