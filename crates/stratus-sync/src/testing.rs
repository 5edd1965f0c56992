//! Scripted in-memory daemon and fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::api::DaemonApi;
use crate::error::{SyncError, SyncResult};
use crate::model::{DaemonConfig, FileAction, FileNode, InfoHash, Torrent, TorrentFile};

pub(crate) fn hash(n: u8) -> InfoHash {
    format!("{n:040x}").parse().expect("fixture hash")
}

pub(crate) fn torrent(n: u8, percent: f64) -> Torrent {
    Torrent {
        info_hash: hash(n),
        name: format!("torrent-{n}"),
        loaded: true,
        downloaded: 0,
        size: 0,
        percent,
        started: false,
        dropped: false,
        download_rate: 0.0,
        upload_rate: 0.0,
        peers: 0,
        files: None,
    }
}

pub(crate) fn torrent_with_files(n: u8, files: &[(&str, u64, bool)]) -> Torrent {
    let mut torrent = torrent(n, 0.0);
    torrent.size = files.iter().map(|(_, size, _)| size).sum();
    torrent.files = Some(
        files
            .iter()
            .map(|(path, size, priority)| TorrentFile {
                path: (*path).to_string(),
                size: *size,
                chunks: 1,
                completed: 0,
                percent: 0.0,
                started: *priority,
                priority: *priority,
            })
            .collect(),
    );
    torrent
}

pub(crate) fn daemon_config() -> DaemonConfig {
    DaemonConfig {
        download_directory: "/downloads".into(),
        incoming_port: 50_007,
        enable_upload: true,
        enable_seeding: false,
        auto_start: true,
        disable_encryption: false,
    }
}

/// Daemon double: answers from in-memory state, records every call, and can
/// fail or hold chosen operations.
#[derive(Default)]
pub(crate) struct FakeDaemon {
    torrents: Mutex<Vec<Torrent>>,
    file_tree: Mutex<Option<FileNode>>,
    config: Mutex<Option<DaemonConfig>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
    pub(crate) entered: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl FakeDaemon {
    pub(crate) fn set_torrents(&self, torrents: Vec<Torrent>) {
        *lock(&self.torrents) = torrents;
    }

    pub(crate) fn set_file_tree(&self, tree: FileNode) {
        *lock(&self.file_tree) = Some(tree);
    }

    pub(crate) fn set_config(&self, config: DaemonConfig) {
        *lock(&self.config) = Some(config);
    }

    pub(crate) fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    pub(crate) fn recover(&self, operation: &'static str) {
        lock(&self.failing).remove(operation);
    }

    /// Hold `operation` until [`FakeDaemon::release`]. The fake signals
    /// `entered` once a held call is waiting.
    pub(crate) fn hold(&self, operation: &'static str) {
        lock(&self.gates).insert(operation, Arc::new(Notify::new()));
    }

    pub(crate) fn release(&self, operation: &'static str) {
        if let Some(gate) = lock(&self.gates).remove(operation) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub(crate) fn count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .count()
    }

    async fn enter(&self, operation: &'static str, detail: String) -> SyncResult<()> {
        lock(&self.calls).push(if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{operation} {detail}")
        });
        let gate = lock(&self.gates).get(operation).cloned();
        if let Some(gate) = gate {
            let released = gate.notified();
            self.entered.notify_one();
            released.await;
        }
        if lock(&self.failing).contains(operation) {
            return Err(SyncError::Status {
                operation,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn not_found(operation: &'static str) -> SyncError {
        SyncError::Status {
            operation,
            status: StatusCode::NOT_FOUND,
            message: "Torrent not found".into(),
        }
    }
}

#[async_trait]
impl DaemonApi for FakeDaemon {
    async fn list_torrents(&self) -> SyncResult<Vec<Torrent>> {
        self.enter("list_torrents", String::new()).await?;
        Ok(lock(&self.torrents)
            .iter()
            .cloned()
            .map(|mut torrent| {
                torrent.files = None;
                torrent
            })
            .collect())
    }

    // The answer is read before any hold, so a held call delivers what the
    // daemon held when the request arrived.
    async fn torrent_detail(&self, info_hash: &InfoHash) -> SyncResult<Torrent> {
        let found = lock(&self.torrents)
            .iter()
            .find(|torrent| &torrent.info_hash == info_hash)
            .cloned();
        self.enter("torrent_detail", info_hash.to_string()).await?;
        found.ok_or_else(|| Self::not_found("torrent_detail"))
    }

    async fn add_magnet(&self, magnet: &str) -> SyncResult<()> {
        self.enter("add_magnet", magnet.to_string()).await
    }

    async fn delete_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.enter("delete_torrent", info_hash.to_string()).await?;
        lock(&self.torrents).retain(|torrent| &torrent.info_hash != info_hash);
        Ok(())
    }

    async fn start_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.enter("start_torrent", info_hash.to_string()).await?;
        for torrent in lock(&self.torrents).iter_mut() {
            if &torrent.info_hash == info_hash {
                torrent.started = true;
            }
        }
        Ok(())
    }

    async fn stop_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.enter("stop_torrent", info_hash.to_string()).await?;
        for torrent in lock(&self.torrents).iter_mut() {
            if &torrent.info_hash == info_hash {
                torrent.started = false;
            }
        }
        Ok(())
    }

    async fn update_file_selection(
        &self,
        info_hash: &InfoHash,
        paths: &[String],
        action: FileAction,
    ) -> SyncResult<()> {
        let operation = match action {
            FileAction::Start => "start_files",
            FileAction::Stop => "stop_files",
        };
        self.enter(operation, paths.join(",")).await?;
        let mut torrents = lock(&self.torrents);
        let files = torrents
            .iter_mut()
            .find(|torrent| &torrent.info_hash == info_hash)
            .and_then(|torrent| torrent.files.as_mut());
        for file in files.into_iter().flatten() {
            if paths.contains(&file.path) {
                file.priority = action == FileAction::Start;
            }
        }
        Ok(())
    }

    async fn file_tree(&self) -> SyncResult<FileNode> {
        self.enter("file_tree", String::new()).await?;
        lock(&self.file_tree)
            .clone()
            .ok_or_else(|| Self::not_found("file_tree"))
    }

    async fn delete_file(&self, path: &str) -> SyncResult<()> {
        self.enter("delete_file", path.to_string()).await
    }

    async fn get_config(&self) -> SyncResult<DaemonConfig> {
        self.enter("get_config", String::new()).await?;
        lock(&self.config)
            .clone()
            .ok_or_else(|| Self::not_found("get_config"))
    }

    async fn put_config(&self, config: &DaemonConfig) -> SyncResult<()> {
        self.enter("put_config", config.download_directory.clone())
            .await?;
        *lock(&self.config) = Some(config.clone());
        Ok(())
    }
}
