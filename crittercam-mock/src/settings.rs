use std::path::{Path, PathBuf};
use std::{env, fs, io};

use crittercam_api::WakeReason;
use serde::{Deserialize, Serialize};

use crate::MockError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub wake_reason: WakeReason,
    pub firmware_version: String,
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPointSettings {
    pub ssid: String,
    pub password: String,
    pub rssi: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub ap_ssid: String,
    pub ap_password: String,
    pub attempt_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub provisioning_window_ms: u64,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub access_points: Vec<AccessPointSettings>,
    pub portal_submission: Option<Credentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    Ok,
    Empty,
    InitFailure,
    CaptureError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub mode: CameraMode,
    pub frame_bytes: usize,
    pub stabilize_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinator {
    /// Raw configuration body served to the device
    pub config: Option<String>,
    #[serde(default)]
    pub fetch_fails: bool,
    #[serde(default)]
    pub upload_fails: bool,
    #[serde(default)]
    pub report_fails: bool,
    pub latest_firmware: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clock {
    #[serde(default)]
    pub sync_fails: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub device: Device,
    pub network: Network,
    pub camera: Camera,
    pub coordinator: Coordinator,
    #[serde(default)]
    pub clock: Clock,
}

impl Settings {
    /// Loads `path`, or the bundled defaults when no path is given.
    pub fn new(path: Option<&Path>) -> Result<Self, MockError> {
        let mut settings = match path {
            Some(path) => Self::from_toml(&fs::read_to_string(path)?)?,
            None => Self::from_toml(include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../",
                "configs/default.toml"
            )))?,
        };

        settings.device.data_dir = Self::normalize_path(&settings.device.data_dir)?
            .to_string_lossy()
            .to_string();

        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self, MockError> {
        Ok(toml::from_str(text)?)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.device.data_dir)
    }

    fn normalize_path(path: &str) -> io::Result<PathBuf> {
        let path_buf = PathBuf::from(path);

        Ok(if path_buf.is_absolute() {
            path_buf
        } else {
            env::current_dir()?.join(&path_buf)
        })
    }
}
