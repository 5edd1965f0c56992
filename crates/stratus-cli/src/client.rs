//! Engine wiring and error types shared by command handlers.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use stratus_sync::{HttpDaemonClient, SyncConfig, SyncEngine, SyncError};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<SyncError> for CliError {
    fn from(error: SyncError) -> Self {
        if error.is_validation() {
            Self::Validation(error.to_string())
        } else {
            Self::Failure(error.into())
        }
    }
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) engine: SyncEngine,
    pub(crate) daemon: HttpDaemonClient,
}

impl AppContext {
    /// Build the HTTP client and the engine driving it.
    pub(crate) fn connect(config: SyncConfig, trace_id: &str) -> CliResult<Self> {
        config.validate().map_err(SyncError::from)?;
        let daemon = HttpDaemonClient::from_config(&config, Some(trace_id))?;
        let engine = SyncEngine::new(Arc::new(daemon.clone()), config);
        Ok(Self { engine, daemon })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anyhow::anyhow;
    use stratus_sync::ValidationError;

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::validation("bad").to_string(), "cli error");
    }

    #[test]
    fn sync_validation_errors_stay_validation() {
        let err = CliError::from(SyncError::from(ValidationError::EmptyMagnet));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "please enter a magnet link");
    }

    #[test]
    fn zero_timeout_is_rejected_before_connecting() {
        let mut config = SyncConfig::default();
        config.request_timeout = Duration::ZERO;
        let err = AppContext::connect(config, "trace")
            .err()
            .expect("zero timeout rejected");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("request_timeout"));
    }
}
