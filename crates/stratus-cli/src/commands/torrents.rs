use anyhow::anyhow;
use stratus_sync::{InfoHash, Resource, SyncEngine, SyncError, ValidationError};

use crate::cli::{AddArgs, OutputFormat, SelectArgs, TorrentArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_selection, render_state_list, render_torrent_detail};

pub(crate) async fn handle_list(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    ctx.engine.refresh(&Resource::Torrents).await?;
    let text = ctx
        .engine
        .store()
        .read(|state| render_state_list(state, format))?;
    println!("{text}");
    Ok(())
}

pub(crate) async fn handle_status(
    ctx: &AppContext,
    args: &TorrentArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let info_hash = &args.info_hash;
    ctx.engine
        .refresh(&Resource::TorrentDetail(info_hash.clone()))
        .await?;
    let torrent = ctx
        .engine
        .store()
        .read(|state| state.torrents.get(info_hash).cloned())
        .ok_or_else(|| CliError::failure(anyhow!("torrent {info_hash} is not held")))?;
    println!("{}", render_torrent_detail(&torrent, format)?);
    Ok(())
}

pub(crate) async fn handle_add(ctx: &AppContext, args: &AddArgs) -> CliResult<()> {
    ctx.engine.add_magnet(&args.magnet).await?;
    println!("Torrent submitted.");
    Ok(())
}

pub(crate) async fn handle_remove(ctx: &AppContext, args: &TorrentArgs) -> CliResult<()> {
    ctx.engine.delete_torrent(&args.info_hash).await?;
    println!("Torrent {} deleted.", args.info_hash);
    Ok(())
}

pub(crate) async fn handle_start(ctx: &AppContext, args: &TorrentArgs) -> CliResult<()> {
    ctx.engine.start_torrent(&args.info_hash).await?;
    println!("Torrent {} started.", args.info_hash);
    Ok(())
}

pub(crate) async fn handle_stop(ctx: &AppContext, args: &TorrentArgs) -> CliResult<()> {
    ctx.engine.stop_torrent(&args.info_hash).await?;
    println!("Torrent {} stopped.", args.info_hash);
    Ok(())
}

/// Open a detail session, apply the requested edits locally, then send the
/// difference to the daemon in one apply.
pub(crate) async fn handle_select(
    ctx: &AppContext,
    args: &SelectArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let engine = &ctx.engine;
    let info_hash = &args.info_hash;
    engine.open_detail(info_hash).await?;

    if args.all {
        engine.select_all_files(info_hash)?;
    }
    if args.none || !args.only.is_empty() {
        engine.deselect_all_files(info_hash)?;
    }
    for path in args.only.iter().chain(&args.enable) {
        set_selected(engine, info_hash, path, true)?;
    }
    for path in &args.disable {
        set_selected(engine, info_hash, path, false)?;
    }

    let plan = engine.apply_selection(info_hash).await?;
    let session = engine.detail();
    println!("{}", render_selection(&plan, session.as_ref(), format)?);
    Ok(())
}

fn set_selected(
    engine: &SyncEngine,
    info_hash: &InfoHash,
    path: &str,
    selected: bool,
) -> CliResult<()> {
    let current = engine
        .detail()
        .is_some_and(|session| session.is_selected(path));
    if current != selected {
        engine.toggle_file(info_hash, path)?;
        return Ok(());
    }
    let known = engine.store().read(|state| {
        state
            .torrents
            .get(info_hash)
            .is_some_and(|torrent| torrent.file(path).is_some())
    });
    if known {
        Ok(())
    } else {
        Err(SyncError::from(ValidationError::UnknownFile {
            info_hash: info_hash.clone(),
            path: path.to_string(),
        })
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use stratus_sync::SyncConfig;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn context_with(server: &MockServer) -> Result<AppContext> {
        let config = SyncConfig::new(server.base_url().parse()?);
        AppContext::connect(config, "trace").map_err(|err| anyhow!(err.display_message()))
    }

    fn hash() -> InfoHash {
        HASH.parse().expect("valid hash")
    }

    fn detail_body(selected: [bool; 3]) -> Value {
        json!({
            "InfoHash": HASH,
            "Name": "distro",
            "Loaded": true,
            "Size": 60,
            "Files": [
                {"Path": "a", "Size": 10, "Priority": selected[0]},
                {"Path": "b", "Size": 20, "Priority": selected[1]},
                {"Path": "c", "Size": 30, "Priority": selected[2]}
            ]
        })
    }

    fn select_args(only: &[&str], enable: &[&str], disable: &[&str]) -> SelectArgs {
        let owned = |paths: &[&str]| paths.iter().map(|path| (*path).to_string()).collect();
        SelectArgs {
            info_hash: hash(),
            only: owned(only),
            enable: owned(enable),
            disable: owned(disable),
            all: false,
            none: false,
        }
    }

    #[tokio::test]
    async fn list_refreshes_the_torrents() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/torrents");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{"InfoHash": HASH, "Name": "distro"}]));
        });

        let ctx = context_with(&server)?;
        handle_list(&ctx, OutputFormat::Table)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        assert_eq!(ctx.engine.metrics().total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn status_fetches_the_detail() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path(format!("/api/torrent/{HASH}/files"));
            then.status(200).json_body(detail_body([true, false, false]));
        });

        let ctx = context_with(&server)?;
        handle_status(&ctx, &TorrentArgs { info_hash: hash() }, OutputFormat::Json)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn invalid_magnet_is_a_validation_error() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/torrent");
            then.status(200);
        });

        let ctx = context_with(&server)?;
        let err = handle_add(
            &ctx,
            &AddArgs {
                magnet: "https://example.com/file.torrent".into(),
            },
        )
        .await
        .expect_err("rejected");
        assert_eq!(err.exit_code(), 2);
        mock.assert_hits(0);
        Ok(())
    }

    #[tokio::test]
    async fn select_only_sends_both_batches() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(format!("/api/torrent/{HASH}/files"));
            then.status(200).json_body(detail_body([true, true, false]));
        });
        let start = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/api/torrent/{HASH}/files"))
                .json_body(json!({"filePaths": ["c"], "action": "start"}));
            then.status(200);
        });
        let stop = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/api/torrent/{HASH}/files"))
                .json_body(json!({"filePaths": ["a"], "action": "stop"}));
            then.status(200);
        });

        let ctx = context_with(&server)?;
        handle_select(&ctx, &select_args(&["b", "c"], &[], &[]), OutputFormat::Table)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        start.assert();
        stop.assert();
        Ok(())
    }

    #[tokio::test]
    async fn select_without_changes_sends_nothing() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(format!("/api/torrent/{HASH}/files"));
            then.status(200).json_body(detail_body([true, false, false]));
        });
        let batches = server.mock(|when, then| {
            when.method(POST).path(format!("/api/torrent/{HASH}/files"));
            then.status(200);
        });

        let ctx = context_with(&server)?;
        handle_select(&ctx, &select_args(&[], &["a"], &["b"]), OutputFormat::Table)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        batches.assert_hits(0);

        let err = handle_select(&ctx, &select_args(&[], &[], &["zzz"]), OutputFormat::Table)
            .await
            .expect_err("unknown file");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("zzz"));
        batches.assert_hits(0);
        Ok(())
    }
}
