//! Command handlers grouped by concern.

pub(crate) mod config;
pub(crate) mod files;
pub(crate) mod torrents;
pub(crate) mod watch;
