use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::api::{StorageApi, UploadSource};
use crate::listing::FolderListingStore;
use crate::lock;
use crate::model::{FolderKey, SessionContext};
use crate::progress;

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Pending,
    Done,
    Failed(String),
}

/// One file of an upload batch, as shown in the progress overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadItem {
    pub name: String,
    pub progress_percent: f64,
    pub started_at: Instant,
    pub bytes_total: u64,
    pub outcome: UploadOutcome,
    batch: u64,
}

impl UploadItem {
    pub fn eta(&self, now: Instant) -> Option<Duration> {
        progress::eta(self.started_at, now, self.progress_percent)
    }

    pub fn whole_percent(&self) -> u8 {
        progress::whole_percent(self.progress_percent)
    }
}

/// Per-file result of a settled batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
struct UploadState {
    items: Vec<UploadItem>,
    next_batch: u64,
}

/// Runs upload batches and tracks their items until the grace period ends.
#[derive(Clone)]
pub struct UploadCoordinator {
    api: Arc<dyn StorageApi>,
    context: SessionContext,
    listing: FolderListingStore,
    state: Arc<Mutex<UploadState>>,
    grace: Duration,
}

impl UploadCoordinator {
    pub fn new(
        api: Arc<dyn StorageApi>,
        context: SessionContext,
        listing: FolderListingStore,
        grace: Duration,
    ) -> Self {
        Self {
            api,
            context,
            listing,
            state: Arc::new(Mutex::new(UploadState::default())),
            grace,
        }
    }

    pub fn items(&self) -> Vec<UploadItem> {
        lock(&self.state).items.clone()
    }

    /// Uploads every file concurrently into `destination` and waits until all
    /// of them settle, successful or not. Then refreshes the active listing
    /// and schedules the batch's items for removal after the grace period.
    ///
    /// Must run inside a tokio runtime.
    pub async fn start_batch(&self, files: Vec<UploadSource>, destination: FolderKey) -> BatchReport {
        if files.is_empty() {
            debug!("Empty upload selection, nothing to do");
            return BatchReport::default();
        }

        let started_at = Instant::now();
        let batch = {
            let mut state = lock(&self.state);
            state.next_batch += 1;
            let batch = state.next_batch;
            state.items.extend(files.iter().map(|file| UploadItem {
                name: file.name.clone(),
                progress_percent: 0.0,
                started_at,
                bytes_total: file.size,
                outcome: UploadOutcome::Pending,
                batch,
            }));
            batch
        };
        info!("Uploading {} file(s) to {}", files.len(), destination);

        let transfers = files
            .into_iter()
            .map(|file| self.transfer(batch, file, &destination));
        let results = join_all(transfers).await;

        let mut report = BatchReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.succeeded.push(name),
                Err(message) => report.failed.push((name, message)),
            }
        }
        info!(
            "Upload batch finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );

        if let Err(e) = self.listing.refresh().await {
            warn!("Listing refresh after upload failed: {}", e);
        }

        self.schedule_clear(batch);
        report
    }

    async fn transfer(
        &self,
        batch: u64,
        file: UploadSource,
        destination: &FolderKey,
    ) -> (String, Result<(), String>) {
        let name = file.name.clone();
        let state = self.state.clone();
        let progress_name = name.clone();
        let on_progress = Box::new(move |sent: u64, total: u64| {
            let percent = progress::percent(sent, total);
            // Same-named items share progress; the latest event wins.
            for item in lock(&state).items.iter_mut().filter(|i| i.name == progress_name) {
                item.progress_percent = percent;
            }
        });

        let result = self
            .api
            .upload_file(&self.context.username, destination, file, on_progress)
            .await
            .map_err(|e| e.to_string());

        let mut state = lock(&self.state);
        if let Some(item) = state
            .items
            .iter_mut()
            .find(|i| i.batch == batch && i.name == name && i.outcome == UploadOutcome::Pending)
        {
            match &result {
                Ok(()) => {
                    item.progress_percent = 100.0;
                    item.outcome = UploadOutcome::Done;
                }
                Err(message) => {
                    warn!("Upload of {} failed: {}", name, message);
                    item.outcome = UploadOutcome::Failed(message.clone());
                }
            }
        }
        (name, result)
    }

    fn schedule_clear(&self, batch: u64) {
        let state = self.state.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            lock(&state).items.retain(|item| item.batch != batch);
            debug!("Cleared upload batch {}", batch);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::{entry, FakeApi};

    const GRACE: Duration = Duration::from_millis(1000);

    fn coordinator(api: &Arc<FakeApi>) -> (UploadCoordinator, FolderListingStore) {
        let context = SessionContext::new("alice");
        let listing = FolderListingStore::new(api.clone(), context.clone());
        let uploads = UploadCoordinator::new(api.clone(), context, listing.clone(), GRACE);
        (uploads, listing)
    }

    #[tokio::test]
    async fn test_empty_selection_is_a_no_op() {
        let api = Arc::new(FakeApi::new());
        let (uploads, _) = coordinator(&api);

        let report = uploads.start_batch(Vec::new(), FolderKey::Home).await;

        assert!(report.is_empty());
        assert!(uploads.items().is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_refreshes_listing_then_clears_items() {
        let api = Arc::new(FakeApi::new());
        api.put_files(&FolderKey::Home, vec![entry("a.txt", 10)]);
        let (uploads, listing) = coordinator(&api);
        listing.set_folder(FolderKey::Home).await.unwrap();

        let report = uploads
            .start_batch(
                vec![UploadSource::from_bytes("b.txt", vec![0u8; 100])],
                FolderKey::Home,
            )
            .await;

        assert_eq!(report.succeeded, ["b.txt"]);
        assert!(report.all_succeeded());
        let names: Vec<_> = listing.snapshot().entries.into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);

        // still visible at 100% during the grace period
        let items = uploads.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].whole_percent(), 100);
        assert_eq!(items[0].outcome, UploadOutcome::Done);

        tokio::time::sleep(GRACE + Duration::from_millis(50)).await;
        assert!(uploads.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_is_reported_per_file() {
        let api = Arc::new(FakeApi::new());
        api.fail_name("bad.bin");
        let (uploads, listing) = coordinator(&api);
        listing.set_folder(FolderKey::Home).await.unwrap();

        let report = uploads
            .start_batch(
                vec![
                    UploadSource::from_bytes("good.txt", vec![1u8; 8]),
                    UploadSource::from_bytes("bad.bin", vec![2u8; 8]),
                ],
                FolderKey::Home,
            )
            .await;

        assert_eq!(report.succeeded, ["good.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad.bin");

        let items = uploads.items();
        let bad = items.iter().find(|i| i.name == "bad.bin").unwrap();
        assert!(matches!(bad.outcome, UploadOutcome::Failed(_)));
        assert_eq!(bad.whole_percent(), 50);

        // the listing is refreshed regardless of the failure
        assert_eq!(listing.snapshot().entries, vec![entry("good.txt", 8)]);
        assert_eq!(api.calls().iter().filter(|c| c.starts_with("list")).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfers_run_concurrently() {
        let api = Arc::new(FakeApi::new());
        let (uploads, _) = coordinator(&api);

        uploads
            .start_batch(
                vec![
                    UploadSource::from_bytes("one", vec![0u8; 4]),
                    UploadSource::from_bytes("two", vec![0u8; 4]),
                ],
                FolderKey::Home,
            )
            .await;

        // both transfers were started before either finished
        let calls = api.calls();
        assert_eq!(&calls[..2], ["upload one to Home", "upload two to Home"]);
    }

    #[tokio::test]
    async fn test_same_name_uploads_share_progress_but_keep_outcomes() {
        let api = Arc::new(FakeApi::new());
        let first = api.gate_upload("dup.txt");
        let second = api.gate_upload("dup.txt");
        let (uploads, _) = coordinator(&api);

        let older = uploads.start_batch(
            vec![UploadSource::from_bytes("dup.txt", vec![0u8; 100])],
            FolderKey::Home,
        );
        let newer = uploads.start_batch(
            vec![UploadSource::from_bytes("dup.txt", vec![0u8; 400])],
            FolderKey::Home,
        );
        let driver = async {
            while api.calls().len() < 2 {
                tokio::task::yield_now().await;
            }
            let items = uploads.items();
            assert_eq!(items.len(), 2);
            assert!(items.iter().all(|i| i.whole_percent() == 50));

            first.send(Ok(())).unwrap();
            while !uploads.items().iter().any(|i| i.outcome == UploadOutcome::Done) {
                tokio::task::yield_now().await;
            }
            // the finished transfer's last event reached both items
            let items = uploads.items();
            assert_eq!(items[0].outcome, UploadOutcome::Done);
            assert_eq!(items[1].outcome, UploadOutcome::Pending);
            assert_eq!(items[1].whole_percent(), 100);

            second
                .send(Err(ApiError::Server("disk full".to_string())))
                .unwrap();
        };

        let (older, newer, ()) = tokio::join!(older, newer, driver);

        assert_eq!(older.succeeded, ["dup.txt"]);
        assert!(older.failed.is_empty());
        assert!(newer.succeeded.is_empty());
        assert_eq!(
            newer.failed,
            [("dup.txt".to_string(), "Server error: disk full".to_string())]
        );

        let items = uploads.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].bytes_total, 100);
        assert_eq!(items[0].outcome, UploadOutcome::Done);
        assert_eq!(items[1].bytes_total, 400);
        assert_eq!(
            items[1].outcome,
            UploadOutcome::Failed("Server error: disk full".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_batch_survives_older_clear() {
        let api = Arc::new(FakeApi::new());
        let (uploads, _) = coordinator(&api);

        uploads
            .start_batch(vec![UploadSource::from_bytes("first", vec![0u8; 4])], FolderKey::Home)
            .await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        uploads
            .start_batch(vec![UploadSource::from_bytes("second", vec![0u8; 4])], FolderKey::Home)
            .await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let names: Vec<_> = uploads.items().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["second"]);
    }
}
