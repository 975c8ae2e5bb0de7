//! Wall-clock handling.
//!
//! The RTC counts seconds from 2000-01-01T00:00:00Z while the coordinator
//! publishes instants as milliseconds since the Unix epoch. Every
//! comparison between the two goes through [`ClockConverter`].

use time::OffsetDateTime;

/// Seconds between 1970-01-01T00:00:00Z and 2000-01-01T00:00:00Z.
pub const DEVICE_EPOCH_OFFSET_SECS: i64 = 946_684_800;

pub struct ClockConverter;

impl ClockConverter {
    /// Converts device-local seconds into coordinator epoch milliseconds.
    pub const fn to_server_epoch_ms(local_seconds: i64) -> i64 {
        local_seconds
            .saturating_add(DEVICE_EPOCH_OFFSET_SECS)
            .saturating_mul(1000)
    }

    /// Converts coordinator epoch milliseconds into device-local seconds, rounding down.
    pub const fn to_local_seconds(server_epoch_ms: i64) -> i64 {
        server_epoch_ms
            .div_euclid(1000)
            .saturating_sub(DEVICE_EPOCH_OFFSET_SECS)
    }

    pub const fn to_unix_seconds(local_seconds: i64) -> i64 {
        local_seconds.saturating_add(DEVICE_EPOCH_OFFSET_SECS)
    }

    /// Calendar view of a device-local instant, if it is representable.
    pub fn to_utc(local_seconds: i64) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(Self::to_unix_seconds(local_seconds)).ok()
    }
}

/// Real-time clock of the device.
#[allow(async_fn_in_trait)]
pub trait Clock {
    type Error: core::fmt::Debug;

    /// Current wall-clock time in seconds since the device epoch.
    fn now_local_seconds(&self) -> i64;

    /// Sets the clock from a network time source.
    async fn synchronize(&mut self) -> Result<(), Self::Error>;
}
