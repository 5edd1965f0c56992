//! Output renderers and formatting helpers for CLI commands.
//!
//! Renderers return the text instead of printing it so `watch` can redraw and
//! tests can inspect what a command would show.

use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use stratus_sync::{
    DaemonConfig, FileNode, Metrics, SelectionPlan, SelectionSession, SyncState, Torrent,
    format_bytes, format_rate,
};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

#[derive(Serialize)]
struct ListView<'a> {
    torrents: &'a [&'a Torrent],
    metrics: &'a Metrics,
}

#[derive(Serialize)]
struct SelectionView<'a> {
    #[serde(flatten)]
    plan: &'a SelectionPlan,
    selected: usize,
    total: usize,
    selected_size: u64,
}

fn to_json(value: &impl Serialize) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

/// Render the torrent list held in `state` with its dashboard totals.
pub(crate) fn render_state_list(state: &SyncState, format: OutputFormat) -> CliResult<String> {
    let torrents: Vec<&Torrent> = state.torrents.iter().map(Arc::as_ref).collect();
    render_torrent_list(&torrents, &Metrics::compute(&state.torrents), format)
}

pub(crate) fn render_torrent_list(
    torrents: &[&Torrent],
    metrics: &Metrics,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&ListView { torrents, metrics }),
        OutputFormat::Table => {
            let mut lines = vec![format!(
                "{:<40} {:<11} {:>7} {:>12} {:>12} {:>5} NAME",
                "HASH", "STATE", "PROG", "DOWN", "UP", "PEERS"
            )];
            for torrent in torrents {
                let progress = format!("{:.1}%", torrent.percent);
                lines.push(format!(
                    "{:<40} {:<11} {:>7} {:>12} {:>12} {:>5} {}",
                    torrent.info_hash,
                    state_label(torrent),
                    progress,
                    format_rate(torrent.download_rate),
                    format_rate(torrent.upload_rate),
                    torrent.peers,
                    display_name(torrent)
                ));
            }
            lines.push(format!(
                "{} torrents, {} active, {} complete | down {} up {} | {} peers",
                metrics.total,
                metrics.active,
                metrics.completed,
                format_rate(metrics.download_rate),
                format_rate(metrics.upload_rate),
                metrics.peers
            ));
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_torrent_detail(torrent: &Torrent, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(torrent),
        OutputFormat::Table => {
            let mut lines = vec![
                format!("hash: {}", torrent.info_hash),
                format!("name: {}", display_name(torrent)),
                format!("state: {}", state_label(torrent)),
                format!(
                    "progress: {:.1}% ({} / {})",
                    torrent.percent,
                    format_bytes(bytes_to_f64(torrent.downloaded)),
                    format_bytes(bytes_to_f64(torrent.size))
                ),
                format!(
                    "rates: down {} / up {}",
                    format_rate(torrent.download_rate),
                    format_rate(torrent.upload_rate)
                ),
                format!("peers: {}", torrent.peers),
            ];
            match &torrent.files {
                None => lines.push("files: not loaded yet".to_string()),
                Some(files) => {
                    lines.push("files:".to_string());
                    lines.push(format!("  SEL {:>10} {:>7} PATH", "SIZE", "PROG"));
                    for file in files {
                        let progress = format!("{:.1}%", file.percent);
                        lines.push(format!(
                            "  {} {:>10} {:>7} {}",
                            if file.priority { "[x]" } else { "[ ]" },
                            format_bytes(bytes_to_f64(file.size)),
                            progress,
                            file.path
                        ));
                    }
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_selection(
    plan: &SelectionPlan,
    session: Option<&SelectionSession>,
    format: OutputFormat,
) -> CliResult<String> {
    let (selected, total, selected_size) = session.map_or((0, 0, 0), |session| {
        (
            session.selected_count(),
            session.total_count(),
            session.selected_size(),
        )
    });
    match format {
        OutputFormat::Json => to_json(&SelectionView {
            plan,
            selected,
            total,
            selected_size,
        }),
        OutputFormat::Table => {
            let mut lines = Vec::new();
            if plan.is_empty() {
                lines.push("No selection changes.".to_string());
            }
            lines.extend(plan.to_start.iter().map(|path| format!("start: {path}")));
            lines.extend(plan.to_stop.iter().map(|path| format!("stop: {path}")));
            lines.push(format!(
                "selected {selected}/{total} files ({})",
                format_bytes(bytes_to_f64(selected_size))
            ));
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_file_tree(tree: &FileNode, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(tree),
        OutputFormat::Table => {
            let mut lines = Vec::new();
            for node in tree.top_level() {
                push_node(node, 0, &mut lines);
            }
            if lines.is_empty() {
                lines.push("(no completed downloads)".to_string());
            }
            Ok(lines.join("\n"))
        }
    }
}

fn push_node(node: &FileNode, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    if node.is_dir() {
        lines.push(format!("{indent}{}/", node.name));
        for child in &node.children {
            push_node(child, depth + 1, lines);
        }
        return;
    }
    let modified = node
        .modified
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    lines.push(
        format!(
            "{indent}{}  {}  {modified}",
            node.name,
            format_bytes(bytes_to_f64(node.size))
        )
        .trim_end()
        .to_string(),
    );
}

pub(crate) fn render_config(config: &DaemonConfig, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(config),
        OutputFormat::Table => Ok([
            format!("download directory: {}", config.download_directory),
            format!("incoming port: {}", config.incoming_port),
            format!("upload: {}", on_off(config.enable_upload)),
            format!("seeding: {}", on_off(config.enable_seeding)),
            format!("auto start: {}", on_off(config.auto_start)),
            format!("encryption: {}", on_off(!config.disable_encryption)),
        ]
        .join("\n")),
    }
}

#[must_use]
pub(crate) fn state_label(torrent: &Torrent) -> &'static str {
    if torrent.dropped {
        "dropped"
    } else if torrent.is_complete() {
        "complete"
    } else if torrent.started {
        "downloading"
    } else if !torrent.loaded {
        "loading"
    } else {
        "stopped"
    }
}

fn display_name(torrent: &Torrent) -> &str {
    if torrent.name.is_empty() {
        "<unnamed>"
    } else {
        &torrent.name
    }
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
