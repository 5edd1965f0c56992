//! User commands: validate, mutate remotely, then re-fetch what changed.
//!
//! Nothing is applied optimistically. The only local write not driven by a
//! snapshot is the removal of a torrent the daemon confirmed deleted.

use tracing::info;

use crate::engine::SyncEngine;
use crate::error::{SyncResult, ValidationError};
use crate::fetcher::Resource;
use crate::model::{DaemonConfig, InfoHash, validate_magnet};
use crate::reconcile::acknowledge_delete;
use crate::scheduler::View;

impl SyncEngine {
    /// Add a torrent from a magnet link.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or non-magnet link, otherwise
    /// the daemon failure.
    pub async fn add_magnet(&self, input: &str) -> SyncResult<()> {
        let magnet = validate_magnet(input)?;
        self.api.add_magnet(magnet).await?;
        info!(command = "add_magnet", "torrent submitted");
        self.refresh_after("add_magnet", Resource::Torrents).await;
        Ok(())
    }

    /// Delete a torrent. Its entity, any detail session for it and its detail
    /// poller are retired in one store update once the daemon confirms.
    ///
    /// # Errors
    ///
    /// Returns the daemon failure; local state is left untouched.
    pub async fn delete_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.api.delete_torrent(info_hash).await?;
        self.store.mutate(|state| acknowledge_delete(state, info_hash));
        self.scheduler.stop(&View::TorrentDetail(info_hash.clone()));
        info!(command = "delete_torrent", info_hash = %info_hash, "torrent deleted");
        self.refresh_after("delete_torrent", Resource::Torrents).await;
        Ok(())
    }

    /// Start transferring a torrent.
    ///
    /// # Errors
    ///
    /// Returns the daemon failure.
    pub async fn start_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.api.start_torrent(info_hash).await?;
        info!(command = "start_torrent", info_hash = %info_hash, "torrent started");
        self.refresh_after("start_torrent", Resource::Torrents).await;
        Ok(())
    }

    /// Pause a torrent.
    ///
    /// # Errors
    ///
    /// Returns the daemon failure.
    pub async fn stop_torrent(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.api.stop_torrent(info_hash).await?;
        info!(command = "stop_torrent", info_hash = %info_hash, "torrent stopped");
        self.refresh_after("stop_torrent", Resource::Torrents).await;
        Ok(())
    }

    /// Delete a node from the completed-downloads tree.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPath`] for a blank path, otherwise the
    /// daemon failure.
    pub async fn delete_file(&self, path: &str) -> SyncResult<()> {
        let path = path.trim();
        if path.trim_matches('/').is_empty() {
            return Err(ValidationError::EmptyPath.into());
        }
        self.api.delete_file(path).await?;
        info!(command = "delete_file", path, "file deleted");
        self.refresh_after("delete_file", Resource::FileTree).await;
        Ok(())
    }

    /// Replace the daemon settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error for settings the daemon would refuse,
    /// otherwise the daemon failure.
    pub async fn update_config(&self, config: &DaemonConfig) -> SyncResult<()> {
        config.validate()?;
        self.api.put_config(config).await?;
        info!(command = "update_config", "daemon settings saved");
        self.refresh_after("update_config", Resource::Config).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::SyncConfig;
    use crate::error::{SyncError, ValidationError};
    use crate::fetcher::Resource;
    use crate::model::FileNode;
    use crate::scheduler::View;
    use crate::testing::{FakeDaemon, daemon_config, hash, torrent, torrent_with_files};
    use crate::SyncEngine;

    fn engine(fake: &Arc<FakeDaemon>) -> SyncEngine {
        SyncEngine::new(fake.clone(), SyncConfig::default())
    }

    #[tokio::test]
    async fn invalid_magnet_never_reaches_the_daemon() {
        let fake = Arc::new(FakeDaemon::default());
        let engine = engine(&fake);

        for input in ["", "   ", "http://example.com/a.torrent"] {
            let err = engine.add_magnet(input).await.expect_err("rejected");
            assert!(err.is_validation());
        }
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn add_refreshes_the_list() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_torrents(vec![torrent(1, 0.0)]);
        let engine = engine(&fake);

        engine
            .add_magnet(" magnet:?xt=urn:btih:abc ")
            .await
            .expect("add");
        assert_eq!(
            fake.calls(),
            ["add_magnet magnet:?xt=urn:btih:abc", "list_torrents"]
        );
        assert_eq!(engine.metrics().total, 1);
    }

    #[tokio::test]
    async fn delete_closes_the_open_session_atomically() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_torrents(vec![
            torrent_with_files(1, &[("a", 1, true)]),
            torrent(2, 0.0),
        ]);
        let engine = engine(&fake);
        engine.refresh(&Resource::Torrents).await.expect("list");
        engine.open_detail(&hash(1)).await.expect("open");
        let mut changes = engine.subscribe();
        changes.borrow_and_update();

        engine.delete_torrent(&hash(1)).await.expect("delete");

        let state = changes.borrow_and_update().clone();
        assert!(state.detail.is_none());
        assert!(!state.torrents.contains(&hash(1)));
        assert!(state.torrents.contains(&hash(2)));
    }

    #[tokio::test]
    async fn delete_discards_a_detail_poll_already_in_flight() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_torrents(vec![
            torrent_with_files(1, &[("a", 1, true)]),
            torrent(2, 0.0),
        ]);
        let engine = engine(&fake);
        let detail = View::TorrentDetail(hash(1));

        engine.open_detail(&hash(1)).await.expect("open");
        fake.hold("torrent_detail");
        engine.watch_view(detail.clone()).expect("watch");
        fake.entered.notified().await;

        engine.delete_torrent(&hash(1)).await.expect("delete");
        assert!(engine.store().read(|s| s.active_views().all(|view| view != &detail)));
        fake.release("torrent_detail");
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let state = engine.store().snapshot();
        assert!(!state.torrents.contains(&hash(1)));
        assert!(state.torrents.contains(&hash(2)));
        assert!(state.detail.is_none());
        assert!(!engine.unwatch_view(&detail));
        assert_eq!(fake.count("torrent_detail"), 2);
    }

    #[tokio::test]
    async fn failed_delete_leaves_state_untouched() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_torrents(vec![torrent_with_files(1, &[("a", 1, true)])]);
        fake.fail("delete_torrent");
        let engine = engine(&fake);
        engine.open_detail(&hash(1)).await.expect("open");

        assert!(engine.delete_torrent(&hash(1)).await.is_err());
        assert!(engine.detail().is_some());
        assert!(engine.store().read(|s| s.torrents.contains(&hash(1))));
        assert_eq!(fake.count("list_torrents"), 0);
    }

    #[tokio::test]
    async fn follow_up_failure_still_reports_success() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_torrents(vec![torrent(1, 0.0)]);
        fake.fail("list_torrents");
        let engine = engine(&fake);

        engine.start_torrent(&hash(1)).await.expect("start succeeds");
        engine.stop_torrent(&hash(1)).await.expect("stop succeeds");
        assert_eq!(fake.count("list_torrents"), 2);
        assert!(engine.store().read(|s| s.torrents.is_empty()));
    }

    #[tokio::test]
    async fn file_deletion_refreshes_the_tree() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_file_tree(FileNode {
            name: "root".into(),
            size: 0,
            modified: None,
            children: Vec::new(),
        });
        let engine = engine(&fake);

        assert!(matches!(
            engine.delete_file(" / ").await,
            Err(SyncError::Validation(ValidationError::EmptyPath))
        ));
        engine.delete_file("movies/a b.mkv").await.expect("delete");
        assert_eq!(
            fake.calls(),
            ["delete_file movies/a b.mkv", "file_tree"]
        );
        assert!(engine.store().read(|s| s.file_tree.is_some()));
    }

    #[tokio::test]
    async fn config_is_validated_then_saved() {
        let fake = Arc::new(FakeDaemon::default());
        let engine = engine(&fake);

        let mut config = daemon_config();
        config.incoming_port = 0;
        assert!(
            engine
                .update_config(&config)
                .await
                .expect_err("port")
                .is_validation()
        );
        assert!(fake.calls().is_empty());

        fake.set_config(daemon_config());
        config.incoming_port = 6881;
        engine.update_config(&config).await.expect("save");
        assert_eq!(
            engine
                .store()
                .read(|s| s.config.as_ref().map(|c| c.incoming_port)),
            Some(6881)
        );
    }

    #[tokio::test]
    async fn closing_detail_stops_its_poller() {
        let fake = Arc::new(FakeDaemon::default());
        fake.set_torrents(vec![torrent_with_files(1, &[("a", 1, true)])]);
        let engine = engine(&fake);

        engine.open_detail(&hash(1)).await.expect("open");
        engine
            .watch_view(View::TorrentDetail(hash(1)))
            .expect("watch");
        assert!(engine.close_detail());
        assert!(!engine.unwatch_view(&View::TorrentDetail(hash(1))));
    }
}
