use beacon_core::{ProviderError, Release, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::schedule::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateResult {
    Disabled,
    Latest,
    UpdateAvailable,
    Exists,
    Downloaded,
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disabled => "disabled",
            Self::Latest => "up to date",
            Self::UpdateAvailable => "update available",
            Self::Exists => "update already downloaded",
            Self::Downloaded => "update downloaded",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct UpdaterSettings {
    pub interval: Ticks,
    pub enabled: bool,
    pub allow_unstable: bool,
    pub allow_download: bool,
    /// `None` makes every audience member eligible for notifications.
    pub permission: Option<String>,
    /// Host-wide switch read from the persisted config.
    pub globally_enabled: bool,
}

impl UpdaterSettings {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.globally_enabled
    }
}

/// The provider whose release won the last pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRelease {
    pub index: usize,
    pub provider: String,
    pub release: Release,
}

/// Everything a pass decides, committed as a whole when the pass ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateState {
    pub current_version: Version,
    pub latest_version: Version,
    pub active: Option<ActiveRelease>,
    pub result: UpdateResult,
    pub settings: UpdaterSettings,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Providers that failed during the last pass.
    pub provider_failures: Vec<ProviderFailure>,
    /// Why the last automatic download failed. A failed download leaves the
    /// result at [`UpdateResult::UpdateAvailable`].
    pub download_error: Option<String>,
}

impl UpdateState {
    #[must_use]
    pub fn new(current_version: Version, settings: UpdaterSettings) -> Self {
        Self {
            latest_version: current_version.clone(),
            current_version,
            active: None,
            result: UpdateResult::Latest,
            settings,
            last_checked_at: None,
            provider_failures: Vec::new(),
            download_error: None,
        }
    }

    #[must_use]
    pub fn active_release(&self) -> Option<&Release> {
        self.active.as_ref().map(|active| &active.release)
    }

    #[must_use]
    pub fn is_update_available(&self) -> bool {
        self.latest_version > self.current_version
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub index: usize,
    pub error: ProviderError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassFailure {
    #[error("all {count} providers failed")]
    AllProvidersFailed { count: usize },

    #[error("update check panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(UpdateResult),
    Failed(PassFailure),
    /// Another pass was already running; nothing was done.
    Skipped,
}

impl PassOutcome {
    #[must_use]
    pub fn result(&self) -> Option<UpdateResult> {
        match self {
            Self::Completed(result) => Some(*result),
            Self::Failed(_) | Self::Skipped => None,
        }
    }
}
