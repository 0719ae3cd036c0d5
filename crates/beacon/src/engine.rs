use beacon_core::{HttpTransport, TrackedProvider, Version};
use beacon_platform::UpdatePaths;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::download::{DownloadError, DownloadManager, DownloadOutcome};
use crate::state::{ActiveRelease, ProviderFailure, UpdateResult, UpdateState};

/// What one reconciliation pass did, beyond the state it committed.
#[derive(Debug)]
pub struct PassReport {
    pub result: UpdateResult,
    pub contacted: usize,
    pub failures: Vec<ProviderFailure>,
    pub download: Option<DownloadOutcome>,
    pub download_error: Option<DownloadError>,
}

impl PassReport {
    fn new(result: UpdateResult) -> Self {
        Self {
            result,
            contacted: 0,
            failures: Vec::new(),
            download: None,
            download_error: None,
        }
    }

    /// Every contacted provider failed, so the pass learned nothing.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.contacted > 0 && self.failures.len() == self.contacted
    }
}

/// A candidate must be strictly newer than the best version seen so far this
/// pass and must differ from the running version. Unstable candidates also
/// need `allow_unstable`.
#[must_use]
pub fn is_eligible(
    candidate: &Version,
    running_latest: &Version,
    current: &Version,
    allow_unstable: bool,
) -> bool {
    candidate > running_latest && (allow_unstable || !candidate.is_unstable()) && candidate != current
}

pub struct Engine {
    transport: Arc<dyn HttpTransport>,
    downloads: DownloadManager,
    paths: UpdatePaths,
}

impl Engine {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, downloads: DownloadManager, paths: UpdatePaths) -> Self {
        Self {
            transport,
            downloads,
            paths,
        }
    }

    /// Recompute `state` from scratch by polling `providers` in order.
    pub async fn run_pass(
        &self,
        state: &mut UpdateState,
        providers: &mut [TrackedProvider],
    ) -> PassReport {
        state.last_checked_at = Some(Utc::now());
        state.latest_version = state.current_version.clone();
        state.active = None;
        state.provider_failures.clear();
        state.download_error = None;

        if !state.settings.is_enabled() {
            debug!("Updater disabled, skipping provider checks");
            state.result = UpdateResult::Disabled;
            return PassReport::new(UpdateResult::Disabled);
        }

        let mut report = PassReport::new(UpdateResult::Latest);
        let allow_unstable = state.settings.allow_unstable;

        for (index, provider) in providers.iter_mut().enumerate() {
            let name = provider.name().to_string();
            report.contacted += 1;

            let release = match provider.fetch(self.transport.as_ref()).await {
                Ok(release) => release,
                Err(error) => {
                    warn!("{name}: update check failed: {error}");
                    let failure = ProviderFailure { index, error };
                    state.provider_failures.push(failure.clone());
                    report.failures.push(failure);
                    continue;
                }
            };

            if !is_eligible(
                &release.version,
                &state.latest_version,
                &state.current_version,
                allow_unstable,
            ) {
                debug!(
                    "{name}: {} is not newer than {} or is filtered as unstable",
                    release.version, state.latest_version
                );
                continue;
            }

            debug!("{name}: {} is the best candidate so far", release.version);
            state.latest_version = release.version.clone();
            state.active = Some(ActiveRelease {
                index,
                provider: name,
                release: release.clone(),
            });
        }

        state.result = if state.is_update_available() {
            UpdateResult::UpdateAvailable
        } else {
            UpdateResult::Latest
        };

        if state.result == UpdateResult::UpdateAvailable {
            info!(
                "Update available: {} -> {}",
                state.current_version, state.latest_version
            );
            self.download_active(state, &mut report).await;
        }

        report.result = state.result;
        report
    }

    async fn download_active(&self, state: &mut UpdateState, report: &mut PassReport) {
        let Some(release) = state.active_release() else {
            return;
        };
        let Some(link) = release.download_link.as_deref() else {
            return;
        };

        let destination = self.paths.artifact_path(link);
        let outcome = self
            .downloads
            .attempt_download(Some(link), &destination, release.download_sha256.as_deref())
            .await;

        match outcome {
            Ok(outcome) => {
                match outcome {
                    DownloadOutcome::Downloaded { .. } => state.result = UpdateResult::Downloaded,
                    DownloadOutcome::Exists => state.result = UpdateResult::Exists,
                    DownloadOutcome::Skipped => {}
                }
                report.download = Some(outcome);
            }
            Err(error) => {
                warn!("Automatic download failed: {error}");
                state.download_error = Some(error.to_string());
                report.download_error = Some(error);
            }
        }
    }
}
