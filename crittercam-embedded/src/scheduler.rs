use core::fmt;

use embassy_time::Duration;

use crate::clock::ClockConverter;
use crate::config::DeviceConfig;

pub const DEFAULT_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;
pub const MIN_INTERVAL_MS: u64 = 60 * 1000;
pub const MAX_INTERVAL_MS: u64 = 48 * 60 * 60 * 1000;
pub const CONNECTIVITY_FAILURE_SLEEP_MS: u64 = 60 * 60 * 1000;

/// Length of a deep sleep. Always within `[MIN_INTERVAL_MS, MAX_INTERVAL_MS]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SleepDuration(u64);

impl SleepDuration {
    pub const MIN: Self = Self(MIN_INTERVAL_MS);
    pub const MAX: Self = Self(MAX_INTERVAL_MS);
    pub const DEFAULT: Self = Self(DEFAULT_INTERVAL_MS);
    pub const CONNECTIVITY_FAILURE: Self = Self(CONNECTIVITY_FAILURE_SLEEP_MS);
    /// Test mode keeps the device cycling as fast as the floor allows.
    pub const TEST_MODE: Self = Self::MIN;

    /// Clamps any millisecond delta into the permitted range.
    pub const fn clamped(millis: i64) -> Self {
        if millis < MIN_INTERVAL_MS as i64 {
            Self::MIN
        } else if millis > MAX_INTERVAL_MS as i64 {
            Self::MAX
        } else {
            Self(millis as u64)
        }
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    pub const fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl fmt::Display for SleepDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / 1000;
        write!(f, "{}h{:02}m{:02}s", secs / 3600, secs / 60 % 60, secs % 60)
    }
}

/// Where a planned sleep came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSource {
    /// No wake-up was supplied.
    Default,
    /// The requested wake-up fell inside the permitted range.
    Requested,
    /// The requested wake-up was too close or already past.
    ClampedToMin { requested_ms: i64 },
    /// The requested wake-up was further out than the ceiling.
    ClampedToMax { requested_ms: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePlan {
    pub duration: SleepDuration,
    pub source: ScheduleSource,
}

pub struct WakeScheduler;

impl WakeScheduler {
    pub fn compute_sleep_duration(config: &DeviceConfig, now_local_seconds: i64) -> SleepDuration {
        Self::plan(config, now_local_seconds).duration
    }

    /// Turns the configured absolute wake-up into a clamped relative sleep.
    pub fn plan(config: &DeviceConfig, now_local_seconds: i64) -> SchedulePlan {
        let Some(target_ms) = config.next_wakeup_absolute_ms else {
            log::info!("No wake-up time configured, sleeping {}", SleepDuration::DEFAULT);
            return SchedulePlan {
                duration: SleepDuration::DEFAULT,
                source: ScheduleSource::Default,
            };
        };

        let now_ms = ClockConverter::to_server_epoch_ms(now_local_seconds);
        let requested_ms = target_ms.saturating_sub(now_ms);
        let duration = SleepDuration::clamped(requested_ms);

        let source = if requested_ms < MIN_INTERVAL_MS as i64 {
            log::warn!(
                "Wake-up time is {} ms away, below the {} ms minimum; clamping",
                requested_ms,
                MIN_INTERVAL_MS
            );
            ScheduleSource::ClampedToMin { requested_ms }
        } else if requested_ms > MAX_INTERVAL_MS as i64 {
            log::warn!(
                "Wake-up time is {} ms away, above the {} ms maximum; clamping",
                requested_ms,
                MAX_INTERVAL_MS
            );
            ScheduleSource::ClampedToMax { requested_ms }
        } else {
            ScheduleSource::Requested
        };

        log::info!("Next wake-up in {}", duration);
        SchedulePlan { duration, source }
    }
}
