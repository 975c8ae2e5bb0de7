use alloc::string::String;

use serde::{Deserialize, Serialize};

use super::{FirmwareVersion, WeatherCondition};

/// Cause of the current boot as reported by the power controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeReason {
    /// Cold boot or hard reset.
    PowerOn,
    /// Scheduled wake from deep sleep.
    Timer,
    /// Wake from an external pin, e.g. the setup button.
    External,
    Other,
}

impl WakeReason {
    /// Interactive provisioning is only offered when someone may be standing at the device.
    pub const fn allows_provisioning(&self) -> bool {
        !matches!(self, WakeReason::Timer)
    }
}

/// Status record posted to the coordinator once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// RSSI of the joined network in dBm
    pub signal_strength: Option<i8>,
    pub firmware_version: FirmwareVersion,
    /// Outcome of the capture and upload phase
    pub image_send_successful: bool,
    pub wake_reason: WakeReason,
    pub running_in_test_mode: bool,
    pub weather_condition: WeatherCondition,
    /// Absolute wake-up requested by the coordinator, in milliseconds since the Unix epoch
    pub next_wakeup_time_ms: Option<i64>,
    /// Boots recorded in persistent device state
    pub boot_count: u32,
    pub last_error: Option<String>,
    /// Free-form diagnostic detail of the capture phase
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> DeviceStatus {
        DeviceStatus {
            signal_strength: Some(-61),
            firmware_version: FirmwareVersion::new(1, 2, 0),
            image_send_successful: false,
            wake_reason: WakeReason::Timer,
            running_in_test_mode: false,
            weather_condition: WeatherCondition::Cloudy,
            next_wakeup_time_ms: None,
            boot_count: 7,
            last_error: None,
            detail: Some("upload: timed out".into()),
        }
    }

    #[test]
    fn test_status_wire_format() {
        let value = serde_json::to_value(status()).unwrap();
        assert_eq!(value["signal_strength"], -61);
        assert_eq!(value["wake_reason"], "timer");
        assert_eq!(value["weather_condition"], "cloudy");
        assert_eq!(value["firmware_version"]["minor"], 2);
        assert!(value["next_wakeup_time_ms"].is_null());
    }

    #[test]
    fn test_provisioning_only_outside_timer_wake() {
        assert!(!WakeReason::Timer.allows_provisioning());
        assert!(WakeReason::PowerOn.allows_provisioning());
        assert!(WakeReason::External.allows_provisioning());
    }
}
