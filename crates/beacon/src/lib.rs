//! Update checking for host plugins.
//!
//! An [`Updater`] polls its providers on a schedule, picks the newest
//! eligible release, optionally downloads it into the shared update folder
//! and tells the console and the permitted audience what it found.

mod download;
mod engine;
mod error;
pub mod logging;
mod notify;
mod schedule;
mod state;
mod updater;

pub use download::{DOWNLOAD_TIMEOUT, DownloadError, DownloadManager, DownloadOutcome};
pub use engine::{Engine, PassReport, is_eligible};
pub use error::ConfigError;
pub use notify::{
    Audience, AudienceMember, EmptyDirectory, LogSink, MemberId, Notification,
    NotificationDispatcher, NotificationSink, Recipient, RecipientDirectory,
};
pub use schedule::{
    DEFAULT_INTERVAL, ExecutionMode, HostScheduler, PassTask, ScheduledTask, TICK, Ticks,
    TokioScheduler, parse_interval,
};
pub use state::{
    ActiveRelease, PassFailure, PassOutcome, ProviderFailure, UpdateResult, UpdateState,
    UpdaterSettings,
};
pub use updater::{UpdateListener, Updater, UpdaterBuilder};

pub use beacon_core::{
    HttpRequest, HttpResponse, HttpTransport, Identifier, Provider, ProviderError, Release,
    ReqwestTransport, ResourceId, TransportError, Version,
};
pub use beacon_platform::{HostVersion, HoverFormat};
pub use beacon_providers as providers;
