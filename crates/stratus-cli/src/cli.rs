//! Command-line client for a remote torrent daemon.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;
use stratus_sync::config::DEFAULT_API_URL;
use stratus_sync::{InfoHash, RemovalPolicy, SyncConfig};
use stratus_telemetry::{LogFormat, LoggingConfig, build_sha, init_logging};
use tracing::{Instrument, Span, info_span};
use uuid::Uuid;

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::config::{handle_config_get, handle_config_set};
use crate::commands::files::{handle_download_url, handle_files, handle_rm_file};
use crate::commands::torrents::{
    handle_add, handle_list, handle_remove, handle_select, handle_start, handle_status,
    handle_stop,
};
use crate::commands::watch::handle_watch;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments and executes the requested command. Returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    if let Err(err) = init_cli_logging(&cli) {
        eprintln!("error: {}", err.display_message());
        return err.exit_code();
    }
    let trace_id = Uuid::new_v4().to_string();
    let span = command_span(&cli.command, &trace_id);

    match dispatch(cli, &trace_id).instrument(span).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn init_cli_logging(cli: &Cli) -> CliResult<()> {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or(LogFormat::Pretty),
        build_sha: env!("CARGO_PKG_VERSION"),
    };
    init_logging(&config).map_err(CliError::failure)
}

fn command_span(command: &Command, trace_id: &str) -> Span {
    info_span!(
        "command",
        command = command_label(command),
        trace_id = %trace_id,
        build_sha = %build_sha()
    )
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let ctx = AppContext::connect(sync_config(&cli), trace_id)?;
    let output = cli.output;

    match cli.command {
        Command::Ls => handle_list(&ctx, output).await,
        Command::Status(args) => handle_status(&ctx, &args, output).await,
        Command::Watch(args) => handle_watch(&ctx, &args, output).await,
        Command::Add(args) => handle_add(&ctx, &args).await,
        Command::Remove(args) => handle_remove(&ctx, &args).await,
        Command::Start(args) => handle_start(&ctx, &args).await,
        Command::Stop(args) => handle_stop(&ctx, &args).await,
        Command::Select(args) => handle_select(&ctx, &args, output).await,
        Command::Files => handle_files(&ctx, output).await,
        Command::RmFile(args) => handle_rm_file(&ctx, &args).await,
        Command::Url(args) => handle_download_url(&ctx, &args),
        Command::Config(config) => match config {
            ConfigCommand::Get => handle_config_get(&ctx, output).await,
            ConfigCommand::Set(args) => handle_config_set(&ctx, &args).await,
        },
    }
}

fn sync_config(cli: &Cli) -> SyncConfig {
    let mut config = SyncConfig::new(cli.api_url.clone());
    config.request_timeout = Duration::from_secs(cli.timeout);
    // Torrents deleted by another client drop out of `watch`.
    config.removal_policy = RemovalPolicy::PruneMissing;
    config
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Ls => "ls",
        Command::Status(_) => "status",
        Command::Watch(_) => "watch",
        Command::Add(_) => "add",
        Command::Remove(_) => "remove",
        Command::Start(_) => "start",
        Command::Stop(_) => "stop",
        Command::Select(_) => "select",
        Command::Files => "files",
        Command::RmFile(_) => "rm_file",
        Command::Url(_) => "url",
        Command::Config(ConfigCommand::Get) => "config_get",
        Command::Config(ConfigCommand::Set(_)) => "config_set",
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

fn parse_info_hash(input: &str) -> Result<InfoHash, String> {
    input.parse::<InfoHash>().map_err(|err| err.to_string())
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse::<LogFormat>().map_err(|err| err.to_string())
}

#[derive(Parser)]
#[command(name = "stratus", about = "Terminal client for a remote torrent daemon")]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "STRATUS_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    api_url: Url,
    #[arg(
        long,
        global = true,
        env = "STRATUS_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout: u64,
    #[arg(
        long,
        global = true,
        env = "STRATUS_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    log_level: String,
    #[arg(
        long,
        global = true,
        env = "STRATUS_LOG_FORMAT",
        value_parser = parse_log_format,
        help = "Log format: pretty or json"
    )]
    log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List torrents with dashboard totals.
    Ls,
    /// Show one torrent and its files.
    Status(TorrentArgs),
    /// Follow the torrent list as it changes.
    Watch(WatchArgs),
    /// Add a torrent from a magnet link.
    Add(AddArgs),
    /// Delete a torrent.
    Remove(TorrentArgs),
    /// Start transferring a torrent.
    Start(TorrentArgs),
    /// Pause a torrent.
    Stop(TorrentArgs),
    /// Change which files of a torrent are downloaded.
    Select(SelectArgs),
    /// Show the completed-downloads tree.
    Files,
    /// Delete a file or directory from the completed-downloads tree.
    RmFile(PathArgs),
    /// Print the download link of a completed file.
    Url(PathArgs),
    /// Read or change daemon settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the daemon settings.
    Get,
    /// Change individual settings.
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub(crate) struct TorrentArgs {
    #[arg(value_parser = parse_info_hash, help = "Torrent info hash")]
    pub(crate) info_hash: InfoHash,
}

#[derive(Args)]
pub(crate) struct WatchArgs {
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Exit after this many updates"
    )]
    pub(crate) ticks: Option<u64>,
}

#[derive(Args)]
pub(crate) struct AddArgs {
    #[arg(help = "Magnet URI")]
    pub(crate) magnet: String,
}

#[derive(Args)]
pub(crate) struct SelectArgs {
    #[arg(value_parser = parse_info_hash, help = "Torrent info hash")]
    pub(crate) info_hash: InfoHash,
    #[arg(
        long,
        conflicts_with_all = ["all", "none"],
        help = "Download exactly these files (repeatable)"
    )]
    pub(crate) only: Vec<String>,
    #[arg(long, help = "Add a file to the selection (repeatable)")]
    pub(crate) enable: Vec<String>,
    #[arg(long, help = "Remove a file from the selection (repeatable)")]
    pub(crate) disable: Vec<String>,
    #[arg(long, conflicts_with = "none", help = "Select every file")]
    pub(crate) all: bool,
    #[arg(long, help = "Deselect every file")]
    pub(crate) none: bool,
}

#[derive(Args)]
pub(crate) struct PathArgs {
    #[arg(help = "Path relative to the download directory")]
    pub(crate) path: String,
}

#[derive(Args, Default)]
pub(crate) struct ConfigSetArgs {
    #[arg(long)]
    pub(crate) download_directory: Option<String>,
    #[arg(long)]
    pub(crate) incoming_port: Option<u16>,
    #[arg(long)]
    pub(crate) enable_upload: Option<bool>,
    #[arg(long)]
    pub(crate) enable_seeding: Option<bool>,
    #[arg(long)]
    pub(crate) auto_start: Option<bool>,
    #[arg(long)]
    pub(crate) disable_encryption: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
