//! Per-torrent file-selection editing.
//!
//! A [`SelectionSession`] keeps the daemon's last confirmed selection
//! (`baseline`) apart from the user's edits (`desired`). Applying sends only
//! the difference, split into a start batch and a stop batch.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ValidationError;
use crate::model::{InfoHash, Torrent};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    /// Desired selection mirrors the daemon.
    Idle,
    /// The user edited the selection.
    Dirty,
    /// Batches are in flight.
    Applying,
}

/// Paths whose selection must change remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionPlan {
    /// Paths to enqueue.
    pub to_start: Vec<String>,
    /// Paths to dequeue.
    pub to_stop: Vec<String>,
}

impl SelectionPlan {
    /// Whether nothing needs to be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_start.is_empty() && self.to_stop.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionFile {
    path: String,
    size: u64,
}

/// Selection state for one open torrent detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSession {
    id: u64,
    info_hash: InfoHash,
    files: Vec<SessionFile>,
    baseline: BTreeSet<String>,
    desired: BTreeSet<String>,
    has_changes: bool,
    phase: SelectionPhase,
}

impl SelectionSession {
    /// Start an idle session from a torrent's loaded detail.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::FilesNotLoaded`] when the detail carries no
    /// file list yet.
    pub fn open(id: u64, torrent: &Torrent) -> Result<Self, ValidationError> {
        let files = torrent
            .files
            .as_deref()
            .ok_or_else(|| ValidationError::FilesNotLoaded {
                info_hash: torrent.info_hash.clone(),
            })?;
        let baseline: BTreeSet<String> = files
            .iter()
            .filter(|file| file.priority)
            .map(|file| file.path.clone())
            .collect();
        Ok(Self {
            id,
            info_hash: torrent.info_hash.clone(),
            files: files
                .iter()
                .map(|file| SessionFile {
                    path: file.path.clone(),
                    size: file.size,
                })
                .collect(),
            desired: baseline.clone(),
            baseline,
            has_changes: false,
            phase: SelectionPhase::Idle,
        })
    }

    /// Session identifier; a reopened torrent gets a new one.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Torrent the session edits.
    #[must_use]
    pub const fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SelectionPhase {
        self.phase
    }

    /// Whether the session mirrors the daemon.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == SelectionPhase::Idle
    }

    /// Whether the user edited the selection since it was last confirmed.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Whether `path` is in the desired selection.
    #[must_use]
    pub fn is_selected(&self, path: &str) -> bool {
        self.desired.contains(path)
    }

    /// Number of files in the desired selection.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.desired.len()
    }

    /// Number of files in the torrent.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.len()
    }

    /// Bytes covered by the desired selection.
    #[must_use]
    pub fn selected_size(&self) -> u64 {
        self.files
            .iter()
            .filter(|file| self.desired.contains(&file.path))
            .map(|file| file.size)
            .sum()
    }

    /// Flip one file's desired selection.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SessionBusy`] while applying and
    /// [`ValidationError::UnknownFile`] for a path outside the torrent.
    pub fn toggle(&mut self, path: &str) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        if !self.files.iter().any(|file| file.path == path) {
            return Err(ValidationError::UnknownFile {
                info_hash: self.info_hash.clone(),
                path: path.to_string(),
            });
        }
        if !self.desired.remove(path) {
            self.desired.insert(path.to_string());
        }
        self.mark_dirty();
        Ok(())
    }

    /// Select every file.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SessionBusy`] while applying.
    pub fn select_all(&mut self) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        self.desired = self.files.iter().map(|file| file.path.clone()).collect();
        self.mark_dirty();
        Ok(())
    }

    /// Deselect every file.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SessionBusy`] while applying.
    pub fn deselect_all(&mut self) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        self.desired.clear();
        self.mark_dirty();
        Ok(())
    }

    /// Difference between the desired selection and the baseline.
    #[must_use]
    pub fn plan(&self) -> SelectionPlan {
        SelectionPlan {
            to_start: self.desired.difference(&self.baseline).cloned().collect(),
            to_stop: self.baseline.difference(&self.desired).cloned().collect(),
        }
    }

    /// Enter `Applying` and hand out the batches to send.
    ///
    /// Returns `None` when the user made no edit; the phase is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SessionBusy`] when already applying.
    pub fn begin_apply(&mut self) -> Result<Option<SelectionPlan>, ValidationError> {
        self.ensure_editable()?;
        if !self.has_changes {
            return Ok(None);
        }
        self.phase = SelectionPhase::Applying;
        Ok(Some(self.plan()))
    }

    /// A batch failed: back to `Dirty` with the edits intact.
    pub fn fail_apply(&mut self) {
        if self.phase == SelectionPhase::Applying {
            self.phase = SelectionPhase::Dirty;
        }
    }

    /// Batches succeeded but no fresh detail is available: the desired
    /// selection becomes the baseline.
    pub fn settle(&mut self) {
        self.baseline = self.desired.clone();
        self.has_changes = false;
        self.phase = SelectionPhase::Idle;
    }

    /// Re-derive the session from a fresh detail and return to `Idle`.
    ///
    /// Returns whether the session changed. A detail without files, or for
    /// another torrent, is ignored.
    pub fn rebase(&mut self, torrent: &Torrent) -> bool {
        if torrent.info_hash != self.info_hash {
            return false;
        }
        let Ok(fresh) = Self::open(self.id, torrent) else {
            return false;
        };
        if *self == fresh {
            return false;
        }
        *self = fresh;
        true
    }

    fn ensure_editable(&self) -> Result<(), ValidationError> {
        if self.phase == SelectionPhase::Applying {
            return Err(ValidationError::SessionBusy);
        }
        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.has_changes = true;
        self.phase = SelectionPhase::Dirty;
    }
}
