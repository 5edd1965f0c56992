//! Façade tying the daemon API, store, fetcher and scheduler together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{DaemonApi, HttpDaemonClient};
use crate::config::SyncConfig;
use crate::error::{BatchFailure, SyncError, SyncResult, ValidationError};
use crate::fetcher::{Resource, SnapshotFetcher};
use crate::metrics::Metrics;
use crate::model::{FileAction, InfoHash};
use crate::reconcile::{apply_snapshot, reconcile_detail};
use crate::scheduler::{PollScheduler, View};
use crate::selection::{SelectionPlan, SelectionSession};
use crate::store::{Store, SyncState};

/// Client-side synchronization engine for one daemon.
pub struct SyncEngine {
    pub(crate) api: Arc<dyn DaemonApi>,
    pub(crate) store: Store,
    pub(crate) fetcher: SnapshotFetcher,
    pub(crate) scheduler: PollScheduler,
    pub(crate) config: SyncConfig,
}

impl SyncEngine {
    /// Engine over an existing API handle.
    #[must_use]
    pub fn new(api: Arc<dyn DaemonApi>, config: SyncConfig) -> Self {
        let store = Store::new();
        let fetcher = SnapshotFetcher::new(Arc::clone(&api));
        let scheduler = PollScheduler::new(store.clone(), fetcher.clone(), config.removal_policy);
        Self {
            api,
            store,
            fetcher,
            scheduler,
            config,
        }
    }

    /// Engine talking HTTP to `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration and
    /// [`SyncError::Transport`] when the HTTP client cannot be built.
    pub fn connect(config: SyncConfig, request_id: Option<&str>) -> SyncResult<Self> {
        config.validate()?;
        let client = HttpDaemonClient::from_config(&config, request_id)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Shared state container.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Change notifications for views.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.store.subscribe()
    }

    /// Dashboard aggregates over the current torrent list.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.store.read(|state| Metrics::compute(&state.torrents))
    }

    /// Open torrent-detail session, if any.
    #[must_use]
    pub fn detail(&self) -> Option<SelectionSession> {
        self.store.read(|state| state.detail.clone())
    }

    /// Start polling `view` at its configured cadence.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero interval.
    pub fn watch_view(&self, view: View) -> SyncResult<()> {
        let interval = self.config.interval_for(&view);
        self.watch_view_every(view, interval)
    }

    /// Start polling `view` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero interval.
    pub fn watch_view_every(&self, view: View, interval: Duration) -> SyncResult<()> {
        self.scheduler.start(view, interval)?;
        Ok(())
    }

    /// Stop polling `view`. Returns whether it was being polled.
    pub fn unwatch_view(&self, view: &View) -> bool {
        self.scheduler.stop(view)
    }

    /// Stop every poller.
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
    }

    /// Fetch `resource` once and reconcile it. Returns whether the store
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; the store is left untouched.
    pub async fn refresh(&self, resource: &Resource) -> SyncResult<bool> {
        let snapshot = self.fetcher.try_fetch(resource).await?;
        let policy = self.config.removal_policy;
        Ok(self
            .store
            .mutate(|state| apply_snapshot(state, snapshot, policy)))
    }

    /// Refresh after a confirmed mutation; failures only warn.
    pub(crate) async fn refresh_after(&self, command: &'static str, resource: Resource) {
        if let Err(err) = self.refresh(&resource).await {
            warn!(
                command,
                resource = resource.label(),
                error = %err,
                "follow-up refresh failed; next poll will catch up"
            );
        }
    }

    /// Fetch a torrent's detail and open a fresh selection session for it,
    /// replacing any open session.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure, or [`ValidationError::FilesNotLoaded`] when
    /// the daemon has no file list yet (the detail is still reconciled).
    pub async fn open_detail(&self, info_hash: &InfoHash) -> SyncResult<SelectionSession> {
        let torrent = self.api.torrent_detail(info_hash).await?;
        let session = SelectionSession::open(self.store.next_serial(), &torrent);
        let opened = session.clone().ok();
        self.store.mutate(|state| {
            let changed = reconcile_detail(&mut state.torrents, torrent);
            match opened {
                Some(session) => {
                    state.detail = Some(session);
                    true
                }
                None => changed,
            }
        });
        debug!(info_hash = %info_hash, "detail session opened");
        Ok(session?)
    }

    /// Close the open detail session and stop polling its torrent. Returns
    /// whether a session was open.
    pub fn close_detail(&self) -> bool {
        let mut closed = None;
        self.store.mutate(|state| {
            closed = state.detail.take();
            closed.is_some()
        });
        let Some(session) = closed else {
            return false;
        };
        self.scheduler
            .stop(&View::TorrentDetail(session.info_hash().clone()));
        true
    }

    /// Flip one file's desired selection.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no matching session is open, the path
    /// is unknown, or the session is applying.
    pub fn toggle_file(&self, info_hash: &InfoHash, path: &str) -> SyncResult<()> {
        self.edit_session(info_hash, |session| session.toggle(path))
    }

    /// Select every file of the open session.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no matching session is open or it is
    /// applying.
    pub fn select_all_files(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.edit_session(info_hash, SelectionSession::select_all)
    }

    /// Deselect every file of the open session.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no matching session is open or it is
    /// applying.
    pub fn deselect_all_files(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.edit_session(info_hash, SelectionSession::deselect_all)
    }

    /// Send the open session's pending selection changes.
    ///
    /// Both batches go out concurrently; an empty batch is skipped. On success
    /// the detail is re-fetched and the session returns to idle; on failure
    /// the session keeps its edits. Returns the plan that was sent, empty when
    /// there was nothing to do.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no matching session is open or it is
    /// already applying, and [`SyncError::Batch`] when a batch fails.
    pub async fn apply_selection(&self, info_hash: &InfoHash) -> SyncResult<SelectionPlan> {
        let mut begun = Err(ValidationError::NoDetailSession);
        self.store.mutate(|state| {
            let Some(session) = Self::session_for(state, info_hash, &mut begun) else {
                return false;
            };
            let id = session.id();
            begun = session
                .begin_apply()
                .map(|plan| plan.map(|plan| (id, plan)));
            matches!(begun, Ok(Some(_)))
        });
        let Some((session_id, plan)) = begun? else {
            debug!(info_hash = %info_hash, "no selection changes to apply");
            return Ok(SelectionPlan::default());
        };

        info!(
            info_hash = %info_hash,
            start = plan.to_start.len(),
            stop = plan.to_stop.len(),
            "applying file selection"
        );
        let (started, stopped) = tokio::join!(
            self.send_batch(info_hash, &plan.to_start, FileAction::Start),
            self.send_batch(info_hash, &plan.to_stop, FileAction::Stop),
        );
        let failed: Vec<BatchFailure> = [started, stopped]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if !failed.is_empty() {
            self.store.mutate(|state| match state.detail.as_mut() {
                Some(session) if session.id() == session_id => {
                    session.fail_apply();
                    true
                }
                _ => false,
            });
            return Err(SyncError::Batch { failed });
        }

        let refreshed = match self.api.torrent_detail(info_hash).await {
            Ok(torrent) => Some(torrent),
            Err(err) => {
                warn!(
                    info_hash = %info_hash,
                    error = %err,
                    "detail refresh after selection apply failed"
                );
                None
            }
        };
        self.store.mutate(|state| {
            let fetched = refreshed.is_some();
            let changed = refreshed
                .is_some_and(|torrent| reconcile_detail(&mut state.torrents, torrent));
            let latest = state.torrents.get(info_hash).cloned();
            match state.detail.as_mut() {
                Some(session) if session.id() == session_id => {
                    let rebased = fetched
                        && latest.is_some_and(|torrent| session.rebase(&torrent));
                    if !rebased {
                        session.settle();
                    }
                    true
                }
                _ => changed,
            }
        });
        Ok(plan)
    }

    async fn send_batch(
        &self,
        info_hash: &InfoHash,
        paths: &[String],
        action: FileAction,
    ) -> Result<(), BatchFailure> {
        if paths.is_empty() {
            return Ok(());
        }
        self.api
            .update_file_selection(info_hash, paths, action)
            .await
            .map_err(|err| BatchFailure {
                action,
                paths: paths.len(),
                message: err.to_string(),
            })
    }

    fn edit_session(
        &self,
        info_hash: &InfoHash,
        edit: impl FnOnce(&mut SelectionSession) -> Result<(), ValidationError>,
    ) -> SyncResult<()> {
        let mut result = Err(ValidationError::NoDetailSession);
        self.store.mutate(|state| {
            let Some(session) = Self::session_for(state, info_hash, &mut result) else {
                return false;
            };
            result = edit(session);
            result.is_ok()
        });
        Ok(result?)
    }

    fn session_for<'a, T>(
        state: &'a mut SyncState,
        info_hash: &InfoHash,
        result: &mut Result<T, ValidationError>,
    ) -> Option<&'a mut SelectionSession> {
        let session = state.detail.as_mut()?;
        if session.info_hash() != info_hash {
            *result = Err(ValidationError::SessionMismatch {
                open: session.info_hash().clone(),
            });
            return None;
        }
        Some(session)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.scheduler.stop_all();
    }
}
