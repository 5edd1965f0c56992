use anyhow::anyhow;
use stratus_sync::{Resource, SyncError, ValidationError};

use crate::cli::{OutputFormat, PathArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_file_tree;

pub(crate) async fn handle_files(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    ctx.engine.refresh(&Resource::FileTree).await?;
    let tree = ctx
        .engine
        .store()
        .read(|state| state.file_tree.clone())
        .ok_or_else(|| CliError::failure(anyhow!("daemon returned no file tree")))?;
    println!("{}", render_file_tree(&tree, format)?);
    Ok(())
}

pub(crate) async fn handle_rm_file(ctx: &AppContext, args: &PathArgs) -> CliResult<()> {
    ctx.engine.delete_file(&args.path).await?;
    println!("Deleted {}.", args.path.trim());
    Ok(())
}

pub(crate) fn handle_download_url(ctx: &AppContext, args: &PathArgs) -> CliResult<()> {
    let path = args.path.trim();
    if path.trim_matches('/').is_empty() {
        return Err(SyncError::from(ValidationError::EmptyPath).into());
    }
    println!("{}", ctx.daemon.download_url(path)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::prelude::*;
    use serde_json::json;
    use stratus_sync::SyncConfig;

    fn context_with(server: &MockServer) -> Result<AppContext> {
        let config = SyncConfig::new(server.base_url().parse()?);
        AppContext::connect(config, "trace").map_err(|err| anyhow!(err.display_message()))
    }

    fn path(value: &str) -> PathArgs {
        PathArgs {
            path: value.to_string(),
        }
    }

    #[tokio::test]
    async fn files_fetches_the_tree() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/files");
            then.status(200).json_body(json!({
                "Name": "downloads",
                "Children": [{"Name": "notes.txt", "Size": 12, "Modified": "2024-05-02T08:00:00Z"}]
            }));
        });

        let ctx = context_with(&server)?;
        handle_files(&ctx, OutputFormat::Table)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        assert!(ctx.engine.store().read(|state| state.file_tree.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn rm_file_deletes_then_refreshes_the_tree() -> Result<()> {
        let server = MockServer::start_async().await;
        let remove = server.mock(|when, then| {
            when.method(DELETE).path("/api/files/movies/a.mkv");
            then.status(200);
        });
        let tree = server.mock(|when, then| {
            when.method(GET).path("/api/files");
            then.status(200).json_body(json!({"Name": "downloads", "Children": []}));
        });

        let ctx = context_with(&server)?;
        handle_rm_file(&ctx, &path(" movies/a.mkv "))
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        remove.assert();
        tree.assert();

        let err = handle_rm_file(&ctx, &path("/"))
            .await
            .expect_err("blank path");
        assert_eq!(err.exit_code(), 2);
        remove.assert_hits(1);
        Ok(())
    }

    #[test]
    fn download_url_rejects_blank_paths() -> Result<()> {
        let config = SyncConfig::new("http://127.0.0.1:3000".parse()?);
        let ctx = AppContext::connect(config, "trace").map_err(|err| anyhow!(err.display_message()))?;
        handle_download_url(&ctx, &path("movies/a b.mkv"))
            .map_err(|err| anyhow!(err.display_message()))?;
        let err = handle_download_url(&ctx, &path(" // ")).expect_err("blank");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }
}
