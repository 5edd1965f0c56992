//! Periodic polling per active view.
//!
//! # Design
//! - One ticker task per view; every tick spawns its own fetch so a slow
//!   response never delays the next request.
//! - Stopping a view retires its generation in the store. Fetches already in
//!   flight still complete, but the generation check runs inside the same
//!   store mutation that would apply them, so nothing lands after a stop.
//! - Results of overlapping fetches apply in arrival order; an older response
//!   that arrives last wins.
//! - A polled detail never inserts a torrent the store no longer holds.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::fetcher::{Resource, Snapshot, SnapshotFetcher};
use crate::model::InfoHash;
use crate::reconcile::{RemovalPolicy, apply_snapshot};
use crate::store::Store;

/// A screen that keeps one resource fresh while it is visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    /// Torrent list.
    Dashboard,
    /// One torrent's detail.
    TorrentDetail(InfoHash),
    /// Completed-downloads tree.
    Files,
    /// Daemon settings.
    Settings,
}

impl View {
    /// Resource the view polls.
    #[must_use]
    pub fn resource(&self) -> Resource {
        match self {
            Self::Dashboard => Resource::Torrents,
            Self::TorrentDetail(info_hash) => Resource::TorrentDetail(info_hash.clone()),
            Self::Files => Resource::FileTree,
            Self::Settings => Resource::Config,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::TorrentDetail(_) => "torrent_detail",
            Self::Files => "files",
            Self::Settings => "settings",
        }
    }
}

/// What happened to a polled snapshot on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The snapshot changed the store.
    Applied,
    /// The snapshot matched what the store held.
    Unchanged,
    /// The view was stopped or restarted; the snapshot was dropped.
    Discarded,
}

/// Apply a polled snapshot if `generation` is still the view's current one
/// and, for a detail, its torrent is still held.
pub(crate) fn apply_polled(
    store: &Store,
    view: &View,
    generation: u64,
    snapshot: Snapshot,
    policy: RemovalPolicy,
) -> PollOutcome {
    let mut outcome = PollOutcome::Discarded;
    store.mutate(|state| {
        if !state.is_view_active(view, generation) {
            return false;
        }
        let orphaned = matches!(
            &snapshot,
            Snapshot::Detail(torrent) if !state.torrents.contains(&torrent.info_hash)
        );
        if orphaned {
            return false;
        }
        let changed = apply_snapshot(state, snapshot, policy);
        outcome = if changed {
            PollOutcome::Applied
        } else {
            PollOutcome::Unchanged
        };
        changed
    });
    outcome
}

/// Owns the ticker of every active view.
pub struct PollScheduler {
    store: Store,
    fetcher: SnapshotFetcher,
    policy: RemovalPolicy,
    tickers: Mutex<HashMap<View, JoinHandle<()>>>,
}

impl PollScheduler {
    /// Scheduler writing into `store`.
    #[must_use]
    pub fn new(store: Store, fetcher: SnapshotFetcher, policy: RemovalPolicy) -> Self {
        Self {
            store,
            fetcher,
            policy,
            tickers: Mutex::new(HashMap::new()),
        }
    }

    /// Poll `view` now and then every `interval`, replacing any poller the
    /// view already had. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] for a zero interval.
    pub fn start(&self, view: View, interval: Duration) -> Result<(), ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::InvalidConfig {
                field: "interval",
                reason: "must be greater than zero",
            });
        }
        let generation = self.store.activate_view(view.clone());
        let handle = tokio::spawn(run_ticker(
            view.clone(),
            generation,
            interval,
            self.store.clone(),
            self.fetcher.clone(),
            self.policy,
        ));
        info!(
            view = view.label(),
            generation,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "polling started"
        );
        if let Some(previous) = self.tickers().insert(view, handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop polling `view`. Returns whether it was being polled.
    pub fn stop(&self, view: &View) -> bool {
        let retired = self.store.deactivate_view(view);
        let ticker = self.tickers().remove(view);
        if let Some(handle) = &ticker {
            handle.abort();
            info!(view = view.label(), "polling stopped");
        }
        retired || ticker.is_some()
    }

    /// Stop every view.
    pub fn stop_all(&self) {
        let views: Vec<View> = self.tickers().keys().cloned().collect();
        for view in &views {
            self.stop(view);
        }
    }

    /// Views with a live ticker.
    #[must_use]
    pub fn active(&self) -> Vec<View> {
        self.tickers().keys().cloned().collect()
    }

    fn tickers(&self) -> MutexGuard<'_, HashMap<View, JoinHandle<()>>> {
        self.tickers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        let tickers = self
            .tickers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (view, handle) in tickers.drain() {
            handle.abort();
            self.store.deactivate_view(&view);
        }
    }
}

async fn run_ticker(
    view: View,
    generation: u64,
    interval: Duration,
    store: Store,
    fetcher: SnapshotFetcher,
    policy: RemovalPolicy,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !store.read(|state| state.is_view_active(&view, generation)) {
            break;
        }
        let view = view.clone();
        let store = store.clone();
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            let Some(snapshot) = fetcher.fetch(&view.resource()).await else {
                return;
            };
            let outcome = apply_polled(&store, &view, generation, snapshot, policy);
            debug!(view = view.label(), generation, ?outcome, "poll result");
        });
    }
}
