mod normalizer;

pub use normalizer::*;

use crittercam_api::WeatherCondition;

/// Coordinator-supplied settings after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub test_mode: bool,
    pub weather_condition: WeatherCondition,
    /// Absolute wake-up in milliseconds since the Unix epoch, always positive.
    pub next_wakeup_absolute_ms: Option<i64>,
}
