use beacon_platform::{StorageError, UnsupportedHost};
use thiserror::Error;

/// Rejected updater configuration. Raised while building, never during a
/// check.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one provider must be configured")]
    NoProviders,

    #[error("Check interval must be at least one tick (50ms), got: {input}")]
    IntervalTooShort { input: String },

    #[error("Invalid check interval {input}: {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error(transparent)]
    UnsupportedHost(#[from] UnsupportedHost),

    #[error("No scheduler configured and no tokio runtime is available")]
    NoScheduler,

    #[error("Failed to create HTTP transport: {0}")]
    Transport(#[from] beacon_core::TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ConfigError {
    pub(crate) fn invalid_interval(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInterval {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigError;
    use beacon_platform::HostVersion;

    #[test]
    fn unsupported_host_converts_into_config_error() {
        let error = HostVersion::from_package("v1_7_R4").expect_err("revision is unsupported");
        let mapped = ConfigError::from(error);
        assert!(matches!(mapped, ConfigError::UnsupportedHost(ref inner) if inner.input == "v1_7_R4"));
    }

    #[test]
    fn invalid_interval_display_includes_reason() {
        let error = ConfigError::invalid_interval("3 fortnights", "unknown unit `fortnights`");
        assert_eq!(
            error.to_string(),
            "Invalid check interval 3 fortnights: unknown unit `fortnights`"
        );
    }
}
