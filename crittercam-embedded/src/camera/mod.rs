mod pipeline;

pub use pipeline::*;

use core::fmt::Debug;

use alloc::vec::Vec;

use crittercam_api::WeatherCondition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteBalance {
    /// Sensor auto white balance.
    #[default]
    None,
    Sunny,
    Cloudy,
}

impl From<WeatherCondition> for WhiteBalance {
    fn from(weather: WeatherCondition) -> Self {
        match weather {
            WeatherCondition::Sunny => WhiteBalance::Sunny,
            WeatherCondition::Cloudy | WeatherCondition::Overcast => WhiteBalance::Cloudy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSize {
    /// 2048x1536
    #[default]
    Qxga,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraSettings {
    pub contrast: i8,
    pub saturation: i8,
    pub frame_size: FrameSize,
    pub white_balance: WhiteBalance,
}

impl CameraSettings {
    pub fn for_weather(weather: WeatherCondition) -> Self {
        Self {
            contrast: 1,
            saturation: -1,
            frame_size: FrameSize::Qxga,
            white_balance: weather.into(),
        }
    }
}

/// Camera peripheral.
///
/// Calls are blocking. `deinit` must be safe to call whatever state
/// `init` left the sensor in.
pub trait CameraDriver {
    type Error: Debug;

    fn init(&mut self) -> Result<(), Self::Error>;

    fn configure(&mut self, settings: &CameraSettings) -> Result<(), Self::Error>;

    /// Captures one JPEG frame.
    fn capture(&mut self) -> Result<Vec<u8>, Self::Error>;

    fn deinit(&mut self) -> Result<(), Self::Error>;
}
