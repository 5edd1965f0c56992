//! Merge fetched snapshots into the store.
//!
//! Entities are replaced wholesale, never field-merged. An incoming entity
//! equal to the held one keeps the held `Arc`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;

use crate::fetcher::Snapshot;
use crate::model::{InfoHash, Torrent};
use crate::scheduler::View;
use crate::store::{SyncState, TorrentCollection};

/// What it means for a list snapshot to omit a held torrent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Keep it; only an acknowledged delete removes a torrent.
    #[default]
    RetainMissing,
    /// Treat the omission as a removal.
    PruneMissing,
}

/// Effect of a list reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutcome {
    /// Keys not held before.
    pub inserted: usize,
    /// Keys whose entity changed.
    pub replaced: usize,
    /// Keys dropped under [`RemovalPolicy::PruneMissing`].
    pub pruned: Vec<InfoHash>,
    /// Whether the display order moved.
    pub reordered: bool,
}

impl ListOutcome {
    /// Whether the collection changed at all.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.replaced > 0 || !self.pruned.is_empty() || self.reordered
    }
}

/// Merge a full list snapshot.
///
/// Incoming keys take the snapshot's order; retained keys follow in their
/// previous relative order. A key repeated in the snapshot keeps its first
/// position and its last value.
pub fn reconcile_list(
    collection: &mut TorrentCollection,
    incoming: Vec<Torrent>,
    policy: RemovalPolicy,
) -> ListOutcome {
    let (previous_order, mut previous) = collection.take_entries();
    let mut outcome = ListOutcome::default();
    let mut order = Vec::with_capacity(incoming.len().max(previous_order.len()));
    let mut by_hash: HashMap<InfoHash, Arc<Torrent>> = HashMap::with_capacity(order.capacity());

    for torrent in incoming {
        let key = torrent.info_hash.clone();
        let entry = match previous.remove(&key) {
            Some(held) if *held == torrent => held,
            Some(_) => {
                outcome.replaced += 1;
                Arc::new(torrent)
            }
            None => match by_hash.get(&key) {
                Some(earlier) if **earlier == torrent => Arc::clone(earlier),
                Some(_) => {
                    outcome.replaced += 1;
                    Arc::new(torrent)
                }
                None => {
                    outcome.inserted += 1;
                    Arc::new(torrent)
                }
            },
        };
        if by_hash.insert(key.clone(), entry).is_none() {
            order.push(key);
        }
    }

    let seen: HashSet<&InfoHash> = order.iter().collect();
    let missing: Vec<InfoHash> = previous_order
        .iter()
        .filter(|key| !seen.contains(key))
        .cloned()
        .collect();

    for key in missing {
        let Some(held) = previous.remove(&key) else {
            continue;
        };
        match policy {
            RemovalPolicy::RetainMissing => {
                by_hash.insert(key.clone(), held);
                order.push(key);
            }
            RemovalPolicy::PruneMissing => outcome.pruned.push(key),
        }
    }

    outcome.reordered = order != previous_order;
    *collection = TorrentCollection::from_parts(order, by_hash);
    outcome
}

/// Merge one torrent's detail without touching any other entity.
///
/// Returns whether the collection changed.
pub fn reconcile_detail(collection: &mut TorrentCollection, torrent: Torrent) -> bool {
    if collection
        .get(&torrent.info_hash)
        .is_some_and(|held| **held == torrent)
    {
        return false;
    }
    collection.upsert(Arc::new(torrent));
    true
}

/// Remove a torrent the daemon confirmed deleted, close its detail session and
/// retire its detail poller.
///
/// Returns whether anything changed.
pub fn acknowledge_delete(state: &mut SyncState, info_hash: &InfoHash) -> bool {
    let removed = state.torrents.remove(info_hash).is_some();
    let closed = close_session_for(state, info_hash);
    let retired = state.retire_view(&View::TorrentDetail(info_hash.clone()));
    removed || closed || retired
}

/// Merge any snapshot into the state.
///
/// Returns whether the state changed.
pub fn apply_snapshot(state: &mut SyncState, snapshot: Snapshot, policy: RemovalPolicy) -> bool {
    match snapshot {
        Snapshot::Torrents(incoming) => {
            let outcome = reconcile_list(&mut state.torrents, incoming, policy);
            let mut closed = false;
            for key in &outcome.pruned {
                closed |= close_session_for(state, key);
            }
            outcome.changed() || closed
        }
        Snapshot::Detail(torrent) => {
            let changed = reconcile_detail(&mut state.torrents, torrent);
            let rebased = rebase_idle_session(state);
            changed || rebased
        }
        Snapshot::FileTree(tree) => {
            if state.file_tree.as_deref() == Some(&tree) {
                return false;
            }
            state.file_tree = Some(Arc::new(tree));
            true
        }
        Snapshot::Config(config) => {
            if state.config.as_deref() == Some(&config) {
                return false;
            }
            state.config = Some(Arc::new(config));
            true
        }
    }
}

fn close_session_for(state: &mut SyncState, info_hash: &InfoHash) -> bool {
    if state
        .detail
        .as_ref()
        .is_some_and(|session| session.info_hash() == info_hash)
    {
        state.detail = None;
        return true;
    }
    false
}

fn rebase_idle_session(state: &mut SyncState) -> bool {
    let Some(session) = state.detail.as_mut() else {
        return false;
    };
    if !session.is_idle() {
        return false;
    }
    let Some(torrent) = state.torrents.get(session.info_hash()) else {
        return false;
    };
    session.rebase(torrent)
}
