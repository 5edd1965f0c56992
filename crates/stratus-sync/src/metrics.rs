//! Dashboard aggregates and human readable sizes.

use serde::Serialize;

use crate::store::TorrentCollection;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Counts and rates summed over the torrent list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// Torrents held.
    pub total: usize,
    /// Torrents still downloading.
    pub active: usize,
    /// Torrents at 100%.
    pub completed: usize,
    /// Torrents transferring.
    pub started: usize,
    /// Torrents the daemon soft-removed.
    pub dropped: usize,
    /// Download rate in bytes per second, dropped torrents included.
    pub download_rate: f64,
    /// Upload rate in bytes per second, dropped torrents included.
    pub upload_rate: f64,
    /// Connected peers.
    pub peers: u64,
}

impl Metrics {
    /// Aggregate the current list.
    #[must_use]
    pub fn compute(torrents: &TorrentCollection) -> Self {
        torrents.iter().fold(Self::default(), |mut acc, torrent| {
            acc.total += 1;
            if torrent.is_complete() {
                acc.completed += 1;
            } else {
                acc.active += 1;
            }
            acc.started += usize::from(torrent.started);
            acc.dropped += usize::from(torrent.dropped);
            acc.download_rate += torrent.download_rate;
            acc.upload_rate += torrent.upload_rate;
            acc.peers += u64::from(torrent.peers);
            acc
        })
    }
}

/// Format a byte count, e.g. `1536.0` as `"1.5 KB"`.
#[must_use]
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }
    let mut scaled = bytes;
    let mut index = 0;
    while scaled >= 1024.0 && index < UNITS.len() - 1 {
        scaled /= 1024.0;
        index += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", trim_decimal(rounded), UNITS[index])
}

/// Format a transfer rate, e.g. `1536.0` as `"1.5 KB/s"`.
#[must_use]
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

fn trim_decimal(value: f64) -> String {
    let rendered = format!("{value:.2}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
