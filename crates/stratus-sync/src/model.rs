//! Daemon domain types as seen by the client.
//!
//! Field names follow the daemon's JSON (`InfoHash`, `DownloadRate`, ...), so the
//! same structs serve as wire DTOs and as the entities held in the store.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Hex-encoded 20-byte torrent info hash; the immutable entity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InfoHash(String);

impl InfoHash {
    const HEX_LEN: usize = 40;

    /// Lowercase hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for InfoHash {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.len() != Self::HEX_LEN || !trimmed.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidInfoHash {
                value: value.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for InfoHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InfoHash> for String {
    fn from(value: InfoHash) -> Self {
        value.0
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Torrent as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Torrent {
    /// Entity key.
    pub info_hash: InfoHash,
    /// Display name (empty until metadata arrives).
    #[serde(default)]
    pub name: String,
    /// Whether the daemon has the torrent's metadata.
    #[serde(default)]
    pub loaded: bool,
    /// Bytes completed for selected files.
    #[serde(default)]
    pub downloaded: u64,
    /// Total bytes of selected files.
    #[serde(default)]
    pub size: u64,
    /// Completion percent, 0-100.
    #[serde(default)]
    pub percent: f64,
    /// Actively transferring.
    #[serde(default)]
    pub started: bool,
    /// Soft-removed by the daemon.
    #[serde(default)]
    pub dropped: bool,
    /// Instantaneous download rate in bytes per second.
    #[serde(default)]
    pub download_rate: f64,
    /// Instantaneous upload rate in bytes per second.
    #[serde(default)]
    pub upload_rate: f64,
    /// Connected peers.
    #[serde(default)]
    pub peers: u32,
    /// Per-file detail; `None` until the detail has been fetched.
    #[serde(default)]
    pub files: Option<Vec<TorrentFile>>,
}

impl Torrent {
    /// Whether the torrent finished downloading.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }

    /// Look up a file by path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&TorrentFile> {
        self.files.as_deref()?.iter().find(|file| file.path == path)
    }

    /// Whether the loaded files add up to the torrent size.
    ///
    /// Returns `None` while the file list is not loaded.
    #[must_use]
    pub fn file_sizes_consistent(&self) -> Option<bool> {
        let files = self.files.as_deref()?;
        Some(files.iter().map(|file| file.size).sum::<u64>() == self.size)
    }
}

/// File owned by a torrent, keyed by its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TorrentFile {
    /// Path unique within the owning torrent.
    pub path: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Number of chunks covering the file.
    #[serde(default)]
    pub chunks: u32,
    /// Number of completed chunks.
    #[serde(default)]
    pub completed: u32,
    /// Completion percent, 0-100.
    #[serde(default)]
    pub percent: f64,
    /// Transfer started.
    #[serde(default)]
    pub started: bool,
    /// Selected for download.
    #[serde(default)]
    pub priority: bool,
}

/// Node in the completed-downloads tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileNode {
    /// Entry name (a single path segment).
    pub name: String,
    /// Size in bytes; zero for directories.
    #[serde(default)]
    pub size: u64,
    /// Last modification time; absent for directories.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// Child entries; empty for files.
    #[serde(default, deserialize_with = "nullable_children")]
    pub children: Vec<FileNode>,
}

fn nullable_children<'de, D>(deserializer: D) -> Result<Vec<FileNode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<FileNode>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FileNode {
    /// A node with children is a directory whatever its size says. A childless
    /// node without a modification time is an empty directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        !self.children.is_empty() || self.modified.is_none()
    }

    /// Entries below the synthetic root container.
    #[must_use]
    pub fn top_level(&self) -> &[Self] {
        &self.children
    }

    /// Resolve a `/`-separated path relative to this node.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Self> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children.iter().find(|child| child.name == segment)
            })
    }

    /// Sum of file sizes below and including this node.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        if self.is_dir() {
            self.children.iter().map(Self::total_size).sum()
        } else {
            self.size
        }
    }
}

/// Daemon-wide settings, replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DaemonConfig {
    /// Where the daemon writes payloads.
    pub download_directory: String,
    /// Peer listen port.
    pub incoming_port: u16,
    /// Allow uploading to peers.
    #[serde(default)]
    pub enable_upload: bool,
    /// Keep seeding after completion.
    #[serde(default)]
    pub enable_seeding: bool,
    /// Start torrents as soon as their metadata arrives.
    #[serde(default)]
    pub auto_start: bool,
    /// Turn off protocol encryption.
    #[serde(default)]
    pub disable_encryption: bool,
}

impl DaemonConfig {
    /// Reject settings the daemon would refuse.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] for a blank download directory or
    /// a zero incoming port.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.download_directory.trim().is_empty() {
            return Err(ValidationError::InvalidConfig {
                field: "download_directory",
                reason: "must not be empty",
            });
        }
        if self.incoming_port == 0 {
            return Err(ValidationError::InvalidConfig {
                field: "incoming_port",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Direction of a file-selection batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// Enqueue files for transfer.
    Start,
    /// Dequeue files.
    Stop,
}

impl FileAction {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Validate a magnet link before submitting it.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyMagnet`] for blank input and
/// [`ValidationError::InvalidMagnet`] when the scheme is not `magnet:`.
pub fn validate_magnet(input: &str) -> Result<&str, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMagnet);
    }
    if !trimmed.starts_with("magnet:") {
        return Err(ValidationError::InvalidMagnet);
    }
    Ok(trimmed)
}
