use beacon_core::{HttpTransport, Provider, Release, ReqwestTransport, TrackedProvider, Version};
use beacon_platform::{GlobalConfig, HostCapabilities, HostVersion, UpdatePaths};
use futures_util::FutureExt;
use log::{debug, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use crate::download::DownloadManager;
use crate::engine::Engine;
use crate::error::ConfigError;
use crate::notify::{
    Audience, AudienceMember, EmptyDirectory, LogSink, MemberId, NotificationDispatcher,
    NotificationSink, RecipientDirectory,
};
use crate::schedule::{
    DEFAULT_INTERVAL, ExecutionMode, HostScheduler, PassTask, ScheduleSlot, Ticks, TokioScheduler,
    parse_interval,
};
use crate::state::{
    ActiveRelease, PassFailure, PassOutcome, UpdateResult, UpdateState, UpdaterSettings,
};

/// Observes finished passes.
pub trait UpdateListener: Send + Sync {
    /// Called after every pass that ran. Returning `false` suppresses the
    /// notifications for that pass.
    fn on_complete(&self, mode: ExecutionMode, state: &UpdateState, outcome: &PassOutcome) -> bool {
        let _ = (mode, state, outcome);
        true
    }

    fn on_failed(&self, mode: ExecutionMode, failure: &PassFailure) {
        let _ = (mode, failure);
    }
}

enum IntervalInput {
    Text(String),
    Duration(Duration),
}

enum HostInput {
    Version(HostVersion),
    Package(String),
}

#[must_use]
pub struct UpdaterBuilder {
    data_folder: PathBuf,
    plugin_name: String,
    current_version: Version,
    providers: Vec<TrackedProvider>,
    interval: IntervalInput,
    enabled: bool,
    allow_unstable: bool,
    allow_download: bool,
    permission: Option<String>,
    transport: Option<Arc<dyn HttpTransport>>,
    sink: Option<Arc<dyn NotificationSink>>,
    directory: Option<Arc<dyn RecipientDirectory>>,
    scheduler: Option<Arc<dyn HostScheduler>>,
    host: HostInput,
    listeners: Vec<Arc<dyn UpdateListener>>,
}

impl UpdaterBuilder {
    /// Providers are consulted in the order they are added.
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(TrackedProvider::new(provider));
        self
    }

    pub fn boxed_provider(mut self, provider: Box<dyn Provider>) -> Self {
        self.providers.push(TrackedProvider::from_boxed(provider));
        self
    }

    /// Human interval such as `"3h"` or `"1d"`, validated by [`Self::build`].
    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = IntervalInput::Text(interval.into());
        self
    }

    pub fn interval_duration(mut self, interval: Duration) -> Self {
        self.interval = IntervalInput::Duration(interval);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn allow_unstable(mut self, allow: bool) -> Self {
        self.allow_unstable = allow;
        self
    }

    pub fn allow_download(mut self, allow: bool) -> Self {
        self.allow_download = allow;
        self
    }

    /// Only audience members holding `permission` are notified. An empty
    /// permission clears the requirement.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        let permission = permission.into();
        self.permission = (!permission.trim().is_empty()).then_some(permission);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn RecipientDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn HostScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn host_version(mut self, version: HostVersion) -> Self {
        self.host = HostInput::Version(version);
        self
    }

    /// Server package name, such as `org.bukkit.craftbukkit.v1_19_R3`.
    pub fn host_package(mut self, package: impl Into<String>) -> Self {
        self.host = HostInput::Package(package.into());
        self
    }

    pub fn listener(mut self, listener: Arc<dyn UpdateListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the configuration and prepare the shared update folder.
    ///
    /// # Errors
    /// Returns an error when no provider is configured, the interval is
    /// invalid or under one tick, the host revision is unsupported, the
    /// update folder or its config cannot be prepared, or no scheduler is
    /// configured outside a tokio runtime.
    pub fn build(self) -> Result<Arc<Updater>, ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let interval = match &self.interval {
            IntervalInput::Text(text) => parse_interval(text)?,
            IntervalInput::Duration(duration) => Ticks::from_duration(*duration)?,
        };

        let host = match &self.host {
            HostInput::Version(version) => *version,
            HostInput::Package(package) => HostVersion::from_package(package)?,
        };

        let scheduler: Arc<dyn HostScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current().ok_or(ConfigError::NoScheduler)?),
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let paths = UpdatePaths::for_data_folder(&self.data_folder);
        let config = GlobalConfig::load_or_init(&paths)?;
        if !config.enabled {
            info!(
                "Update checks are disabled host-wide in {}",
                paths.config_file().display()
            );
        }

        let settings = UpdaterSettings {
            interval,
            enabled: self.enabled,
            allow_unstable: self.allow_unstable,
            allow_download: self.allow_download,
            permission: self.permission.clone(),
            globally_enabled: config.enabled,
        };

        let profile = host.profile();
        let dispatcher = NotificationDispatcher::new(
            self.plugin_name.clone(),
            self.permission,
            self.sink.unwrap_or_else(|| Arc::new(LogSink)),
            self.directory.unwrap_or_else(|| Arc::new(EmptyDirectory)),
        )
        .with_host(profile.hover_format());

        let downloads = DownloadManager::new(Arc::clone(&transport), self.allow_download);
        debug!(
            "{} updater ready: {} provider(s), every {interval}, host {}",
            self.plugin_name,
            self.providers.len(),
            profile.revision()
        );

        Ok(Arc::new(Updater {
            plugin_name: self.plugin_name,
            host,
            engine: Engine::new(transport, downloads, paths.clone()),
            paths,
            providers: tokio::sync::Mutex::new(self.providers),
            state: Mutex::new(UpdateState::new(self.current_version, settings)),
            in_progress: AtomicBool::new(false),
            dispatcher,
            scheduler,
            schedule: ScheduleSlot::default(),
            listeners: self.listeners,
        }))
    }
}

/// Clears the in-progress flag when the pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Periodically checks the configured providers for a newer release of one
/// plugin.
pub struct Updater {
    plugin_name: String,
    host: HostVersion,
    paths: UpdatePaths,
    engine: Engine,
    providers: tokio::sync::Mutex<Vec<TrackedProvider>>,
    state: Mutex<UpdateState>,
    in_progress: AtomicBool,
    dispatcher: NotificationDispatcher,
    scheduler: Arc<dyn HostScheduler>,
    schedule: ScheduleSlot,
    listeners: Vec<Arc<dyn UpdateListener>>,
}

impl Updater {
    /// `data_folder` is the plugin's own data folder; the shared update
    /// folder is created next to it.
    pub fn builder(
        data_folder: impl AsRef<Path>,
        plugin_name: impl Into<String>,
        current_version: impl Into<Version>,
    ) -> UpdaterBuilder {
        UpdaterBuilder {
            data_folder: data_folder.as_ref().to_path_buf(),
            plugin_name: plugin_name.into(),
            current_version: current_version.into(),
            providers: Vec::new(),
            interval: IntervalInput::Text(DEFAULT_INTERVAL.to_string()),
            enabled: true,
            allow_unstable: false,
            allow_download: true,
            permission: None,
            transport: None,
            sink: None,
            directory: None,
            scheduler: None,
            host: HostInput::Version(HostVersion::default()),
            listeners: Vec::new(),
        }
    }

    /// Run one check now and notify its audience.
    ///
    /// Returns [`PassOutcome::Skipped`] without doing anything when another
    /// pass is still running.
    pub async fn initialize(&self, mode: ExecutionMode) -> PassOutcome {
        let Some(_guard) = PassGuard::acquire(&self.in_progress) else {
            debug!("{}: update check already running, skipping", self.plugin_name);
            return PassOutcome::Skipped;
        };

        let outcome = match AssertUnwindSafe(self.run_pass()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("{}: update check panicked: {message}", self.plugin_name);
                PassOutcome::Failed(PassFailure::Panicked(message))
            }
        };
        let snapshot = self.state();

        if let PassOutcome::Failed(failure) = &outcome {
            for listener in &self.listeners {
                listener.on_failed(mode, failure);
            }
        }

        let mut deliver = true;
        for listener in &self.listeners {
            deliver &= listener.on_complete(mode, &snapshot, &outcome);
        }

        if deliver {
            let audience = match outcome {
                PassOutcome::Failed(_) => Audience::Console,
                _ => Audience::All,
            };
            self.dispatcher.dispatch(audience, &outcome, &snapshot);
        }

        if outcome == PassOutcome::Completed(UpdateResult::Disabled) {
            self.unschedule();
        }
        outcome
    }

    async fn run_pass(&self) -> PassOutcome {
        self.dispatcher.refresh_audience();

        let mut providers = self.providers.lock().await;
        let mut working = self.state();
        let report = self.engine.run_pass(&mut working, &mut providers).await;
        info!("{}: {}", self.plugin_name, working.result);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = working;

        if report.all_failed() {
            PassOutcome::Failed(PassFailure::AllProvidersFailed {
                count: report.contacted,
            })
        } else {
            PassOutcome::Completed(report.result)
        }
    }

    fn schedule_in(self: &Arc<Self>, mode: ExecutionMode) {
        let interval = self.state().settings.interval;
        let updater: Weak<Self> = Arc::downgrade(self);
        let task: PassTask = Arc::new(move || {
            let updater = updater.clone();
            async move {
                if let Some(updater) = updater.upgrade() {
                    updater.initialize(mode).await;
                }
            }
            .boxed()
        });

        self.schedule
            .replace(self.scheduler.run_repeating(mode, interval, task));
        debug!("{}: checks scheduled every {interval}", self.plugin_name);
    }

    /// Check now and then every interval on the primary context. Replaces
    /// any earlier schedule.
    pub fn schedule(self: &Arc<Self>) {
        self.schedule_in(ExecutionMode::Primary);
    }

    /// Like [`Self::schedule`], with checks on a background worker.
    pub fn schedule_async(self: &Arc<Self>) {
        self.schedule_in(ExecutionMode::Worker);
    }

    /// Stop periodic checks. A check already running finishes normally.
    pub fn unschedule(&self) -> bool {
        let cancelled = self.schedule.cancel();
        if cancelled {
            debug!("{}: periodic checks stopped", self.plugin_name);
        }
        cancelled
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_scheduled()
    }

    /// Snapshot of the last committed pass.
    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn result(&self) -> UpdateResult {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).result
    }

    #[must_use]
    pub fn latest_version(&self) -> Version {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_version
            .clone()
    }

    #[must_use]
    pub fn active_release(&self) -> Option<ActiveRelease> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .clone()
    }

    /// Why the last pass could not download the update it found, if it
    /// tried and failed.
    #[must_use]
    pub fn download_error(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .download_error
            .clone()
    }

    /// Release of the winning provider, if any.
    #[must_use]
    pub fn release(&self) -> Option<Release> {
        self.active_release().map(|active| active.release)
    }

    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    #[must_use]
    pub fn host_version(&self) -> HostVersion {
        self.host
    }

    #[must_use]
    pub fn update_folder(&self) -> &Path {
        &self.paths.update_dir
    }

    #[must_use]
    pub fn audience(&self) -> Vec<AudienceMember> {
        self.dispatcher.audience()
    }

    /// Returns whether a pending update notification was delivered.
    pub fn member_joined(&self, member: impl Into<MemberId>) -> bool {
        let state = self.state();
        self.dispatcher.member_joined(member.into(), &state)
    }

    pub fn member_left(&self, member: &MemberId) -> bool {
        self.dispatcher.member_left(member)
    }
}
