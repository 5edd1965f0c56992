//! Remote daemon seam and its HTTP implementation.
//!
//! # Design
//! - [`DaemonApi`] is the only way the core talks to the daemon, so tests can
//!   swap in a scripted fake.
//! - [`HttpDaemonClient`] owns transport details: base URL, timeout, headers.
//! - Bodies are decoded through [`KeyedCollection`] where the daemon may send
//!   either an array or a keyed object.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::{DaemonConfig, FileAction, FileNode, InfoHash, Torrent};
use crate::wire::{KeyedCollection, encode_path};

/// Header carrying the caller's trace identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Operations exposed by the remote daemon.
#[async_trait]
pub trait DaemonApi: Send + Sync {
    /// Read every torrent.
    async fn list_torrents(&self) -> SyncResult<Vec<Torrent>>;

    /// Read one torrent including its file list.
    async fn torrent_detail(&self, info_hash: &InfoHash) -> SyncResult<Torrent>;

    /// Create a torrent from a magnet link.
    async fn add_magnet(&self, magnet: &str) -> SyncResult<()>;

    /// Delete a torrent.
    async fn delete_torrent(&self, info_hash: &InfoHash) -> SyncResult<()>;

    /// Start transferring a torrent.
    async fn start_torrent(&self, info_hash: &InfoHash) -> SyncResult<()>;

    /// Pause a torrent.
    async fn stop_torrent(&self, info_hash: &InfoHash) -> SyncResult<()>;

    /// Enqueue or dequeue a batch of files within one torrent.
    async fn update_file_selection(
        &self,
        info_hash: &InfoHash,
        paths: &[String],
        action: FileAction,
    ) -> SyncResult<()>;

    /// Read the completed-downloads tree.
    async fn file_tree(&self) -> SyncResult<FileNode>;

    /// Delete a node from the completed-downloads tree.
    async fn delete_file(&self, path: &str) -> SyncResult<()>;

    /// Read the daemon settings.
    async fn get_config(&self) -> SyncResult<DaemonConfig>;

    /// Replace the daemon settings.
    async fn put_config(&self, config: &DaemonConfig) -> SyncResult<()>;
}

#[derive(Serialize)]
struct MagnetRequest<'a> {
    magnet: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileSelectionRequest<'a> {
    file_paths: &'a [String],
    action: FileAction,
}

/// `reqwest`-backed [`DaemonApi`].
#[derive(Clone, Debug)]
pub struct HttpDaemonClient {
    client: Client,
    base_url: Url,
}

impl HttpDaemonClient {
    /// Wrap an existing client. The base URL is treated as a directory so
    /// deployments under a path prefix keep that prefix.
    #[must_use]
    pub fn new(client: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    /// Build a client with the configured timeout and an optional trace id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] when the HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig, request_id: Option<&str>) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(value) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(HEADER_REQUEST_ID, value);
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| SyncError::Transport {
                operation: "build_client",
                source,
            })?;
        Ok(Self::new(client, config.api_url.clone()))
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL streaming a completed file from the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Url`] when the path cannot be joined.
    pub fn download_url(&self, path: &str) -> SyncResult<Url> {
        self.endpoint("download_url", &format!("download/{}", encode_path(path)))
    }

    fn endpoint(&self, operation: &'static str, path: &str) -> SyncResult<Url> {
        self.base_url
            .join(path)
            .map_err(|source| SyncError::Url { operation, source })
    }

    async fn send(
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> SyncResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|source| SyncError::Transport { operation, source })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = body.trim();
        Err(SyncError::Status {
            operation,
            status,
            message: if message.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                message.to_string()
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> SyncResult<T> {
        let url = self.endpoint(operation, path)?;
        let response = Self::send(operation, self.client.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| SyncError::Transport { operation, source })?;
        serde_json::from_slice(&bytes).map_err(|source| SyncError::Decode { operation, source })
    }

    async fn post_empty(&self, operation: &'static str, path: &str) -> SyncResult<()> {
        let url = self.endpoint(operation, path)?;
        Self::send(operation, self.client.post(url)).await?;
        Ok(())
    }

    async fn delete(&self, operation: &'static str, path: &str) -> SyncResult<()> {
        let url = self.endpoint(operation, path)?;
        Self::send(operation, self.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl DaemonApi for HttpDaemonClient {
    async fn list_torrents(&self) -> SyncResult<Vec<Torrent>> {
        let collection: KeyedCollection<Torrent> =
            self.get_json("list_torrents", "api/torrents").await?;
        Ok(collection.into_inner())
    }

    async fn torrent_detail(&self, info_hash: &InfoHash) -> SyncResult<Torrent> {
        self.get_json("torrent_detail", &format!("api/torrent/{info_hash}/files"))
            .await
    }

    async fn add_magnet(&self, magnet: &str) -> SyncResult<()> {
        let operation = "add_magnet";
        let url = self.endpoint(operation, "api/torrent")?;
        Self::send(
            operation,
            self.client.post(url).json(&MagnetRequest { magnet }),
        )
        .await?;
        Ok(())
    }

    async fn delete_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.delete("delete_torrent", &format!("api/torrent/{info_hash}"))
            .await
    }

    async fn start_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.post_empty("start_torrent", &format!("api/torrent/{info_hash}/start"))
            .await
    }

    async fn stop_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.post_empty("stop_torrent", &format!("api/torrent/{info_hash}/stop"))
            .await
    }

    async fn update_file_selection(
        &self,
        info_hash: &InfoHash,
        paths: &[String],
        action: FileAction,
    ) -> SyncResult<()> {
        let operation = "update_file_selection";
        let url = self.endpoint(operation, &format!("api/torrent/{info_hash}/files"))?;
        let body = FileSelectionRequest {
            file_paths: paths,
            action,
        };
        Self::send(operation, self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn file_tree(&self) -> SyncResult<FileNode> {
        self.get_json("file_tree", "api/files").await
    }

    async fn delete_file(&self, path: &str) -> SyncResult<()> {
        self.delete("delete_file", &format!("api/files/{}", encode_path(path)))
            .await
    }

    async fn get_config(&self) -> SyncResult<DaemonConfig> {
        self.get_json("get_config", "api/config").await
    }

    async fn put_config(&self, config: &DaemonConfig) -> SyncResult<()> {
        let operation = "put_config";
        let url = self.endpoint(operation, "api/config")?;
        Self::send(operation, self.client.put(url).json(config)).await?;
        Ok(())
    }
}
