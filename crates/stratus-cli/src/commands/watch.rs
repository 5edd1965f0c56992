use stratus_sync::View;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;

use crate::cli::{OutputFormat, WatchArgs};
use crate::client::{AppContext, CliResult};
use crate::output::render_state_list;

/// Poll the dashboard and redraw the list on every store change until the
/// tick budget runs out or the user interrupts.
pub(crate) async fn handle_watch(
    ctx: &AppContext,
    args: &WatchArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let mut updates = WatchStream::from_changes(ctx.engine.subscribe());
    ctx.engine.watch_view(View::Dashboard)?;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut rendered = 0_u64;
    let result = loop {
        tokio::select! {
            update = updates.next() => {
                let Some(state) = update else {
                    break Ok(());
                };
                match render_state_list(&state, format) {
                    Ok(text) => println!("{text}\n"),
                    Err(err) => break Err(err),
                }
                rendered += 1;
                if args.ticks.is_some_and(|limit| rendered >= limit) {
                    break Ok(());
                }
            }
            _ = &mut interrupt => break Ok(()),
        }
    };

    ctx.engine.unwatch_view(&View::Dashboard);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;
    use serde_json::json;
    use stratus_sync::SyncConfig;

    #[tokio::test]
    async fn stops_after_the_requested_updates() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/torrents");
            then.status(200).json_body(json!([
                {"InfoHash": "0123456789abcdef0123456789abcdef01234567", "Name": "distro"}
            ]));
        });

        let config = SyncConfig::new(server.base_url().parse()?);
        let ctx = AppContext::connect(config, "trace")
            .map_err(|err| anyhow!(err.display_message()))?;
        handle_watch(&ctx, &WatchArgs { ticks: Some(1) }, OutputFormat::Json)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        assert!(mock.hits() >= 1);
        assert_eq!(ctx.engine.metrics().total, 1);
        assert!(!ctx.engine.unwatch_view(&View::Dashboard));
        Ok(())
    }
}
