use futures_util::future::BoxFuture;
use log::{debug, warn};
use regex::Regex;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;

pub const TICK: Duration = Duration::from_millis(TICK_MS);
pub const DEFAULT_INTERVAL: &str = "3h";

const TICK_MS: u64 = 50;
#[allow(clippy::cast_precision_loss)]
const TICK_MILLIS: f64 = TICK_MS as f64;

static INTERVAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d*)?|-?\.\d+)\s*([a-zA-Z]*)\s*$")
        .expect("interval pattern should compile")
});

/// A strictly positive number of host ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(NonZeroU64);

impl Ticks {
    #[must_use]
    pub fn new(ticks: u64) -> Option<Self> {
        NonZeroU64::new(ticks).map(Self)
    }

    /// Convert a duration into whole ticks, rounding down.
    ///
    /// # Errors
    /// Returns [`ConfigError::IntervalTooShort`] for durations under one tick.
    pub fn from_duration(duration: Duration) -> Result<Self, ConfigError> {
        let ticks = duration.as_millis() / TICK.as_millis();
        u64::try_from(ticks)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ConfigError::IntervalTooShort {
                input: format!("{duration:?}"),
            })
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0.get()
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.get().saturating_mul(TICK_MS))
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks", self.get())
    }
}

fn unit_millis(unit: &str) -> Option<f64> {
    let millis = match unit.to_ascii_lowercase().as_str() {
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => 1.0,
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800_000.0,
        "mo" | "month" | "months" => 2_629_800_000.0,
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600_000.0,
        _ => return None,
    };
    Some(millis)
}

/// Parse a human interval such as `"3h"`, `"90 min"` or `"1.5d"` into ticks.
/// A bare number is read as seconds.
///
/// # Errors
/// Returns [`ConfigError::InvalidInterval`] for unparseable input or unknown
/// units and [`ConfigError::IntervalTooShort`] for intervals under one tick,
/// including zero and negative values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn parse_interval(input: &str) -> Result<Ticks, ConfigError> {
    let captures = INTERVAL_PATTERN
        .captures(input)
        .ok_or_else(|| ConfigError::invalid_interval(input, "expected a quantity and a unit"))?;

    let quantity: f64 = captures[1]
        .parse()
        .map_err(|error| ConfigError::invalid_interval(input, format!("bad quantity: {error}")))?;
    let unit = &captures[2];
    let millis = unit_millis(unit)
        .ok_or_else(|| ConfigError::invalid_interval(input, format!("unknown unit `{unit}`")))?;

    let ticks = (quantity * millis / TICK_MILLIS).floor();
    if !ticks.is_finite() || ticks > u64::MAX as f64 {
        return Err(ConfigError::invalid_interval(input, "interval is too large"));
    }
    if ticks < 1.0 {
        return Err(ConfigError::IntervalTooShort {
            input: input.to_string(),
        });
    }

    Ticks::new(ticks as u64).ok_or_else(|| ConfigError::IntervalTooShort {
        input: input.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// On the host's primary execution context.
    Primary,
    /// On a background worker.
    Worker,
}

pub type PassTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub trait ScheduledTask: Send + Sync {
    /// Stop future runs. A run already in progress finishes normally.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// The host's repeating-task facility.
///
/// Implementations run `task` once immediately and then every `period`, and
/// never start a run while the previous one is still going.
pub trait HostScheduler: Send + Sync {
    fn run_repeating(
        &self,
        mode: ExecutionMode,
        period: Ticks,
        task: PassTask,
    ) -> Box<dyn ScheduledTask>;
}

#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler on the runtime the caller is running in, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

/// Dropping the handle stops the loop, like [`ScheduledTask::cancel`].
struct TokioTask {
    token: CancellationToken,
}

impl Drop for TokioTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl ScheduledTask for TokioTask {
    fn cancel(&self) {
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl HostScheduler for TokioScheduler {
    fn run_repeating(
        &self,
        mode: ExecutionMode,
        period: Ticks,
        task: PassTask,
    ) -> Box<dyn ScheduledTask> {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let worker = self.handle.clone();

        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(period.as_duration());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match mode {
                    ExecutionMode::Primary => task().await,
                    ExecutionMode::Worker => {
                        if let Err(error) = worker.spawn(task()).await {
                            warn!("Scheduled update check did not finish: {error}");
                        }
                    }
                }
            }
            debug!("Scheduled update checks stopped");
        });

        Box::new(TokioTask { token })
    }
}

/// Holds at most one live schedule; installing a new one cancels the old.
#[derive(Default)]
pub(crate) struct ScheduleSlot {
    current: Mutex<Option<Box<dyn ScheduledTask>>>,
}

impl ScheduleSlot {
    pub(crate) fn replace(&self, task: Box<dyn ScheduledTask>) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    pub(crate) fn cancel(&self) -> bool {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        previous.is_some_and(|task| {
            task.cancel();
            true
        })
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_cancelled())
    }
}
