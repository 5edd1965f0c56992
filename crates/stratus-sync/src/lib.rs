#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Client-side state synchronization for a remote torrent daemon.
//!
//! Layout:
//! - `api.rs`: daemon seam and its `reqwest` implementation
//! - `fetcher.rs`: full-snapshot reads of one resource
//! - `scheduler.rs`: per-view pollers with stop-safe generations
//! - `reconcile.rs`: merging snapshots into the store
//! - `store.rs`: the single state container views subscribe to
//! - `metrics.rs`: dashboard aggregates and size formatting
//! - `selection.rs`: per-file selection diffing
//! - `engine.rs` / `dispatch.rs`: the façade and its commands

pub mod api;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod model;
pub mod reconcile;
pub mod scheduler;
pub mod selection;
pub mod store;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{DaemonApi, HttpDaemonClient};
pub use config::{PollIntervals, SyncConfig};
pub use engine::SyncEngine;
pub use error::{BatchFailure, SyncError, SyncResult, ValidationError};
pub use fetcher::{Resource, Snapshot, SnapshotFetcher};
pub use metrics::{Metrics, format_bytes, format_rate};
pub use model::{DaemonConfig, FileAction, FileNode, InfoHash, Torrent, TorrentFile};
pub use reconcile::RemovalPolicy;
pub use scheduler::{PollScheduler, View};
pub use selection::{SelectionPhase, SelectionPlan, SelectionSession};
pub use store::{Store, SyncState, TorrentCollection};
