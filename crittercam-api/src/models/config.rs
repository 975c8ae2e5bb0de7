use core::fmt;
use core::str::FromStr;

use alloc::string::String;

use serde::{Deserialize, Serialize};

/// Keys of the configuration mapping served by the coordinator.
pub mod keys {
    pub const TEST_MODE: &str = "testMode";
    pub const WEATHER_CONDITION: &str = "weatherCondition";
    pub const NEXT_WAKEUP_TIME_MS: &str = "nextWakeupTimeMs";
    /// Older coordinators publish the absolute wake-up under this name.
    pub const NEXT_WAKEUP_ABSOLUTE_MS: &str = "nextWakeupAbsoluteMs";
}

/// Sky condition forecast for the capture slot, used to pick white balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    #[default]
    Overcast,
}

impl WeatherCondition {
    pub const fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Overcast => "overcast",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownWeather(pub String);

impl fmt::Display for UnknownWeather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown weather condition: {:?}", self.0)
    }
}

impl FromStr for WeatherCondition {
    type Err = UnknownWeather;

    /// Surrounding whitespace and letter case are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "sunny" => Ok(WeatherCondition::Sunny),
            "cloudy" => Ok(WeatherCondition::Cloudy),
            "overcast" => Ok(WeatherCondition::Overcast),
            _ => Err(UnknownWeather(normalized)),
        }
    }
}
