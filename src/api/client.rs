use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{
    multipart::{Form, Part},
    Body, Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{ChunkStream, ProgressCallback, StorageApi, UploadSource};
use crate::error::{ApiError, Result};
use crate::model::{ActivityRecord, FileEntry, FolderKey};

/// reqwest-backed client for the storage service.
#[derive(Debug, Clone)]
pub struct HttpStorageClient {
    client: Client,
    base_url: Url,
}

impl HttpStorageClient {
    pub fn new(base_url: Url) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins `segments` onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn user_endpoint(
        &self,
        segments: &[&str],
        username: &str,
        folder: Option<&FolderKey>,
    ) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("username", username);
            if let Some(dir) = folder.and_then(FolderKey::dir) {
                query.append_pair("dir", dir);
            }
        }
        Ok(url)
    }

    fn download_url(&self, username: &str, folder: &FolderKey, name: &str) -> Result<Url> {
        match folder.dir() {
            Some(dir) => self.user_endpoint(&["download", dir, name], username, None),
            None => self.user_endpoint(&["download", name], username, None),
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let value = Self::read_value(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn read_value(response: Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;
        interpret_body(status, &text)
    }

    async fn post_credentials(&self, path: &str, username: &str, password: &str) -> Result<()> {
        let url = self.endpoint(&[path])?;
        debug!("POST {}", url.path());

        let response = self
            .client
            .post(url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let value = Self::read_value(response).await?;
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(ApiError::Server(format!("{} was rejected", path)));
        }
        Ok(())
    }
}

/// Applies the service's error convention: a JSON object with an `error`
/// string is a failure whatever the status; otherwise the status decides.
pub(crate) fn interpret_body(status: StatusCode, text: &str) -> Result<Value> {
    let parsed = if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(text)
    };

    if let Ok(Value::Object(map)) = &parsed {
        if let Some(message) = map.get("error").and_then(Value::as_str) {
            return Err(ApiError::Server(message.to_string()));
        }
    }

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: text.to_string(),
        });
    }

    Ok(parsed?)
}

/// Reports cumulative bytes as each chunk is handed to the transport.
fn progress_stream(
    chunks: ChunkStream,
    total: u64,
    progress: ProgressCallback,
) -> impl futures::Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static {
    let mut sent = 0u64;
    chunks.map(move |chunk: std::io::Result<Bytes>| -> std::io::Result<Bytes> {
        let chunk = chunk?;
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok(chunk)
    })
}

fn progress_body(chunks: ChunkStream, total: u64, progress: ProgressCallback) -> Body {
    Body::wrap_stream(progress_stream(chunks, total, progress))
}

#[async_trait]
impl StorageApi for HttpStorageClient {
    async fn list_files(&self, username: &str, folder: &FolderKey) -> Result<Vec<FileEntry>> {
        let url = self.user_endpoint(&["files"], username, Some(folder))?;
        debug!("GET {} ({})", url.path(), folder);

        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn upload_file(
        &self,
        username: &str,
        folder: &FolderKey,
        file: UploadSource,
        progress: ProgressCallback,
    ) -> Result<()> {
        let url = self.user_endpoint(&["upload"], username, Some(folder))?;
        let name = file.name.clone();
        let total = file.size;
        let chunks = file.into_chunks().await?;
        debug!("POST {} {} ({} bytes)", url.path(), name, total);

        let part = Part::stream_with_length(progress_body(chunks, total, progress), total)
            .file_name(name);
        let form = Form::new().part("file", part);

        let response = self.client.post(url).multipart(form).send().await?;
        Self::read_value(response).await?;
        Ok(())
    }

    async fn download_file(&self, username: &str, folder: &FolderKey, name: &str) -> Result<Bytes> {
        let url = self.download_url(username, folder, name)?;
        debug!("GET {}", url.path());

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Download of {} failed with status {}", name, status);
            return Err(match interpret_body(status, &error_text) {
                Err(e) => e,
                Ok(_) => ApiError::Status {
                    status: status.as_u16(),
                    body: error_text,
                },
            });
        }

        Ok(response.bytes().await?)
    }

    async fn delete_file(&self, username: &str, folder: &FolderKey, name: &str) -> Result<()> {
        let mut url = self.user_endpoint(&["delete-file"], username, Some(folder))?;
        url.query_pairs_mut().append_pair("file", name);
        debug!("DELETE {} {}", url.path(), name);

        let response = self.client.delete(url).send().await?;
        Self::read_value(response).await?;
        Ok(())
    }

    async fn delete_folder(&self, username: &str, folder: &str) -> Result<()> {
        let mut url = self.user_endpoint(&["delete-folder"], username, None)?;
        url.query_pairs_mut().append_pair("dir", folder);
        debug!("DELETE {} {}", url.path(), folder);

        let response = self.client.delete(url).send().await?;
        Self::read_value(response).await?;
        Ok(())
    }

    async fn list_subfolders(&self, username: &str) -> Result<Vec<String>> {
        let url = self.user_endpoint(&["subdirs"], username, None)?;
        debug!("GET {}", url.path());

        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn create_folder(&self, username: &str, name: &str) -> Result<()> {
        let url = self.user_endpoint(&["create-folder"], username, None)?;
        debug!("POST {} {}", url.path(), name);

        let response = self
            .client
            .post(url)
            .json(&json!({ "folderName": name }))
            .send()
            .await?;
        Self::read_value(response).await?;
        Ok(())
    }

    async fn activity_log(&self, username: &str) -> Result<Vec<ActivityRecord>> {
        let url = self.user_endpoint(&["activity-log"], username, None)?;
        debug!("GET {}", url.path());

        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.post_credentials("login", username, password).await
    }

    async fn register(&self, username: &str, password: &str) -> Result<()> {
        self.post_credentials("register", username, password).await
    }
}
