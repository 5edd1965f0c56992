use anyhow::anyhow;
use stratus_sync::{DaemonConfig, Resource};

use crate::cli::{ConfigSetArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_config;

pub(crate) async fn handle_config_get(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let config = current_config(ctx).await?;
    println!("{}", render_config(&config, format)?);
    Ok(())
}

/// Fetch the settings, overlay the given flags, and save the whole object
/// back; the daemon replaces its settings wholesale.
pub(crate) async fn handle_config_set(ctx: &AppContext, args: &ConfigSetArgs) -> CliResult<()> {
    let mut config = current_config(ctx).await?;
    if !apply_overrides(args, &mut config) {
        return Err(CliError::validation(
            "no settings given (pass at least one flag, see --help)",
        ));
    }
    ctx.engine.update_config(&config).await?;
    println!("Settings saved.");
    Ok(())
}

async fn current_config(ctx: &AppContext) -> CliResult<DaemonConfig> {
    ctx.engine.refresh(&Resource::Config).await?;
    ctx.engine
        .store()
        .read(|state| state.config.as_deref().cloned())
        .ok_or_else(|| CliError::failure(anyhow!("daemon returned no settings")))
}

fn apply_overrides(args: &ConfigSetArgs, config: &mut DaemonConfig) -> bool {
    let mut changed = false;
    if let Some(directory) = &args.download_directory {
        config.download_directory.clone_from(directory);
        changed = true;
    }
    if let Some(port) = args.incoming_port {
        config.incoming_port = port;
        changed = true;
    }
    let switches = [
        (args.enable_upload, &mut config.enable_upload),
        (args.enable_seeding, &mut config.enable_seeding),
        (args.auto_start, &mut config.auto_start),
        (args.disable_encryption, &mut config.disable_encryption),
    ];
    for (value, field) in switches {
        if let Some(value) = value {
            *field = value;
            changed = true;
        }
    }
    changed
}
