//! Retrieve full snapshots of daemon resources.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::DaemonApi;
use crate::error::SyncResult;
use crate::model::{DaemonConfig, FileNode, InfoHash, Torrent};

/// A fetchable daemon resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Every torrent.
    Torrents,
    /// One torrent with its file list.
    TorrentDetail(InfoHash),
    /// Completed-downloads tree.
    FileTree,
    /// Daemon settings.
    Config,
}

impl Resource {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Torrents => "torrents",
            Self::TorrentDetail(_) => "torrent_detail",
            Self::FileTree => "file_tree",
            Self::Config => "config",
        }
    }
}

/// A fetched resource, ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Full torrent list.
    Torrents(Vec<Torrent>),
    /// One torrent's detail.
    Detail(Torrent),
    /// Completed-downloads tree.
    FileTree(FileNode),
    /// Daemon settings.
    Config(DaemonConfig),
}

/// Stateless snapshot reader over a [`DaemonApi`].
#[derive(Clone)]
pub struct SnapshotFetcher {
    api: Arc<dyn DaemonApi>,
}

impl SnapshotFetcher {
    /// Fetch through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn DaemonApi>) -> Self {
        Self { api }
    }

    /// Fetch a resource, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns whatever the daemon call returned.
    pub async fn try_fetch(&self, resource: &Resource) -> SyncResult<Snapshot> {
        let snapshot = match resource {
            Resource::Torrents => Snapshot::Torrents(self.api.list_torrents().await?),
            Resource::TorrentDetail(info_hash) => {
                Snapshot::Detail(self.api.torrent_detail(info_hash).await?)
            }
            Resource::FileTree => Snapshot::FileTree(self.api.file_tree().await?),
            Resource::Config => Snapshot::Config(self.api.get_config().await?),
        };
        debug!(resource = resource.label(), "snapshot fetched");
        Ok(snapshot)
    }

    /// Fetch a resource; a failure is logged and yields no update.
    pub async fn fetch(&self, resource: &Resource) -> Option<Snapshot> {
        match self.try_fetch(resource).await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(
                    resource = resource.label(),
                    error = %err,
                    "snapshot fetch failed; skipping update"
                );
                None
            }
        }
    }
}
