//! Single source of truth for synchronized state.
//!
//! # Design
//! - [`Store`] wraps a `watch` channel; every mutation is one closure run
//!   under the channel's write lock, so readers observe the previous or the
//!   next [`SyncState`], never a partially applied one.
//! - Entities sit behind `Arc`; an unchanged entity keeps its pointer across
//!   reconciles so subscribers can skip redraws with `Arc::ptr_eq`.
//! - The poll generation of every active view lives inside the state, which
//!   lets a poll result be checked and applied in the same mutation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::model::{DaemonConfig, FileNode, InfoHash, Torrent};
use crate::scheduler::View;
use crate::selection::SelectionSession;

/// Torrents keyed by info hash with a stable display order.
#[derive(Debug, Clone, Default)]
pub struct TorrentCollection {
    order: Vec<InfoHash>,
    by_hash: HashMap<InfoHash, Arc<Torrent>>,
}

impl TorrentCollection {
    /// Number of torrents held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no torrent is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a torrent.
    #[must_use]
    pub fn get(&self, info_hash: &InfoHash) -> Option<&Arc<Torrent>> {
        self.by_hash.get(info_hash)
    }

    /// Whether a torrent is held.
    #[must_use]
    pub fn contains(&self, info_hash: &InfoHash) -> bool {
        self.by_hash.contains_key(info_hash)
    }

    /// Keys in display order.
    #[must_use]
    pub fn keys(&self) -> &[InfoHash] {
        &self.order
    }

    /// Torrents in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Torrent>> {
        self.order.iter().filter_map(|key| self.by_hash.get(key))
    }

    pub(crate) fn from_parts(
        order: Vec<InfoHash>,
        by_hash: HashMap<InfoHash, Arc<Torrent>>,
    ) -> Self {
        Self { order, by_hash }
    }

    pub(crate) fn take_entries(&mut self) -> (Vec<InfoHash>, HashMap<InfoHash, Arc<Torrent>>) {
        (
            std::mem::take(&mut self.order),
            std::mem::take(&mut self.by_hash),
        )
    }

    pub(crate) fn upsert(&mut self, torrent: Arc<Torrent>) {
        let key = torrent.info_hash.clone();
        if self.by_hash.insert(key.clone(), torrent).is_none() {
            self.order.push(key);
        }
    }

    pub(crate) fn remove(&mut self, info_hash: &InfoHash) -> Option<Arc<Torrent>> {
        let removed = self.by_hash.remove(info_hash)?;
        self.order.retain(|key| key != info_hash);
        Some(removed)
    }
}

/// Everything the client knows about the daemon.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Torrent list.
    pub torrents: TorrentCollection,
    /// Completed-downloads tree, once fetched.
    pub file_tree: Option<Arc<FileNode>>,
    /// Daemon settings, once fetched.
    pub config: Option<Arc<DaemonConfig>>,
    /// Open torrent-detail session.
    pub detail: Option<SelectionSession>,
    active_views: HashMap<View, u64>,
}

impl SyncState {
    /// Whether `view` is polled under `generation`.
    #[must_use]
    pub fn is_view_active(&self, view: &View, generation: u64) -> bool {
        self.active_views.get(view) == Some(&generation)
    }

    /// Views currently polled.
    pub fn active_views(&self) -> impl Iterator<Item = &View> {
        self.active_views.keys()
    }

    /// Forget `view`'s generation so its in-flight results are discarded.
    pub(crate) fn retire_view(&mut self, view: &View) -> bool {
        self.active_views.remove(view).is_some()
    }
}

#[derive(Debug)]
struct StoreInner {
    sender: watch::Sender<SyncState>,
    serial: AtomicU64,
}

/// Shared handle to the state container.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SyncState::default());
        Self {
            inner: Arc::new(StoreInner {
                sender,
                serial: AtomicU64::new(1),
            }),
        }
    }

    /// Clone of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SyncState {
        self.inner.sender.borrow().clone()
    }

    /// Read the current state without cloning it.
    pub fn read<R>(&self, reader: impl FnOnce(&SyncState) -> R) -> R {
        reader(&self.inner.sender.borrow())
    }

    /// Change notifications; the receiver starts at the current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.sender.subscribe()
    }

    /// Apply one atomic mutation. Subscribers are woken only when `mutation`
    /// reports a change.
    pub(crate) fn mutate(&self, mutation: impl FnOnce(&mut SyncState) -> bool) -> bool {
        self.inner.sender.send_if_modified(mutation)
    }

    /// Monotonic identifier for poll generations and detail sessions.
    pub(crate) fn next_serial(&self) -> u64 {
        self.inner.serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Register `view` under a fresh generation, replacing any previous one.
    pub(crate) fn activate_view(&self, view: View) -> u64 {
        let generation = self.next_serial();
        self.mutate(|state| {
            state.active_views.insert(view, generation);
            false
        });
        generation
    }

    /// Forget `view`; results still in flight for it are discarded on arrival.
    pub(crate) fn deactivate_view(&self, view: &View) -> bool {
        let mut removed = false;
        self.mutate(|state| {
            removed = state.retire_view(view);
            false
        });
        removed
    }
}
