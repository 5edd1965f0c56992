//! Client configuration: daemon location, timeouts, per-view poll cadence and
//! the reconciliation removal policy.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Deserializer};

use crate::error::ValidationError;
use crate::reconcile::RemovalPolicy;
use crate::scheduler::View;

/// Default daemon URL.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll cadence per view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    /// Torrent list.
    #[serde(deserialize_with = "millis")]
    pub dashboard: Duration,
    /// Open torrent detail.
    #[serde(deserialize_with = "millis")]
    pub detail: Duration,
    /// Completed-downloads tree.
    #[serde(deserialize_with = "millis")]
    pub files: Duration,
    /// Daemon settings.
    #[serde(deserialize_with = "millis")]
    pub settings: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            dashboard: Duration::from_secs(2),
            detail: Duration::from_secs(2),
            files: Duration::from_secs(5),
            settings: Duration::from_secs(30),
        }
    }
}

/// Settings for a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Daemon base URL.
    #[serde(deserialize_with = "url")]
    pub api_url: Url,
    /// Per-request timeout.
    #[serde(deserialize_with = "millis")]
    pub request_timeout: Duration,
    /// Poll cadence per view.
    pub poll: PollIntervals,
    /// What a list snapshot's omissions mean.
    pub removal_policy: RemovalPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: default_url(),
            request_timeout: DEFAULT_TIMEOUT,
            poll: PollIntervals::default(),
            removal_policy: RemovalPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Configuration pointing at `api_url` with defaults elsewhere.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            ..Self::default()
        }
    }

    /// Poll cadence for a view.
    #[must_use]
    pub const fn interval_for(&self, view: &View) -> Duration {
        match view {
            View::Dashboard => self.poll.dashboard,
            View::TorrentDetail(_) => self.poll.detail,
            View::Files => self.poll.files,
            View::Settings => self.poll.settings,
        }
    }

    /// Reject zero durations.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] naming the first zero field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            ("request_timeout", self.request_timeout),
            ("poll.dashboard", self.poll.dashboard),
            ("poll.detail", self.poll.detail),
            ("poll.files", self.poll.files),
            ("poll.settings", self.poll.settings),
        ];
        for (field, value) in checks {
            if value.is_zero() {
                return Err(ValidationError::InvalidConfig {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }
        Ok(())
    }
}

fn default_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
