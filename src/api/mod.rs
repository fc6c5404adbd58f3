//! The seam between the session core and the remote storage service.

pub mod client;

pub use client::HttpStorageClient;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncReadExt;

use crate::error::Result;
use crate::model::{ActivityRecord, FileEntry, FolderKey};

/// Upload progress callback: (bytes_sent, bytes_total).
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

pub(crate) type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

pub(crate) const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Where the bytes of an upload come from.
#[derive(Debug, Clone)]
pub enum UploadBody {
    Bytes(Bytes),
    /// Streamed from disk while the transfer runs.
    File(PathBuf),
}

/// One file selected for upload.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub name: String,
    pub size: u64,
    pub body: UploadBody,
}

impl UploadSource {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            body: UploadBody::Bytes(data),
        }
    }

    /// Describes a local file; its content is read when the upload runs.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;

        Ok(Self {
            name,
            size: metadata.len(),
            body: UploadBody::File(path.to_path_buf()),
        })
    }

    /// Yields the content in chunks of at most `UPLOAD_CHUNK_SIZE` bytes.
    /// Files are opened here and read one chunk at a time.
    pub(crate) async fn into_chunks(self) -> std::io::Result<ChunkStream> {
        match self.body {
            UploadBody::Bytes(data) => {
                let chunks: Vec<Bytes> = (0..data.len())
                    .step_by(UPLOAD_CHUNK_SIZE)
                    .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
                    .collect();
                Ok(Box::pin(stream::iter(
                    chunks.into_iter().map(Ok::<Bytes, std::io::Error>),
                )))
            }
            UploadBody::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                Ok(Box::pin(stream::try_unfold(file, |mut file| async move {
                    let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
                    let read = file.read(&mut buf).await?;
                    if read == 0 {
                        return Ok(None);
                    }
                    buf.truncate(read);
                    Ok::<_, std::io::Error>(Some((Bytes::from(buf), file)))
                })))
            }
        }
    }
}

/// Operations offered by the storage service. Every call carries the opaque
/// username of the session it acts for.
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_files(&self, username: &str, folder: &FolderKey) -> Result<Vec<FileEntry>>;

    async fn upload_file(
        &self,
        username: &str,
        folder: &FolderKey,
        file: UploadSource,
        progress: ProgressCallback,
    ) -> Result<()>;

    async fn download_file(&self, username: &str, folder: &FolderKey, name: &str) -> Result<Bytes>;

    async fn delete_file(&self, username: &str, folder: &FolderKey, name: &str) -> Result<()>;

    async fn delete_folder(&self, username: &str, folder: &str) -> Result<()>;

    async fn list_subfolders(&self, username: &str) -> Result<Vec<String>>;

    async fn create_folder(&self, username: &str, name: &str) -> Result<()>;

    async fn activity_log(&self, username: &str) -> Result<Vec<ActivityRecord>>;

    async fn login(&self, username: &str, password: &str) -> Result<()>;

    async fn register(&self, username: &str, password: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_file_is_read_in_chunks() {
        let path = std::env::temp_dir().join(format!("rust-drive-chunks-{}.bin", std::process::id()));
        let content: Vec<u8> = (0..UPLOAD_CHUNK_SIZE * 2 + 10).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let source = UploadSource::from_path(&path).await.unwrap();
        assert_eq!(source.size, content.len() as u64);
        assert!(matches!(source.body, UploadBody::File(_)));

        let chunks: Vec<Bytes> = source.into_chunks().await.unwrap().try_collect().await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= UPLOAD_CHUNK_SIZE));
        assert_eq!(chunks.concat(), content);
    }

    #[tokio::test]
    async fn test_missing_file_fails_on_open() {
        let path = std::env::temp_dir().join(format!("rust-drive-gone-{}.bin", std::process::id()));
        let source = UploadSource {
            name: "gone.bin".to_string(),
            size: 3,
            body: UploadBody::File(path),
        };

        assert!(source.into_chunks().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_bytes_yield_no_chunks() {
        let chunks: Vec<Bytes> = UploadSource::from_bytes("empty.txt", Vec::new())
            .into_chunks()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }
}
