use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
    #[error("Protocol error: {0}")]
    Protocol(#[from] crittercam_api::protocols::Error),
    #[error("Coordinator unreachable")]
    Unreachable,
    #[error("Simulated {0} failure")]
    Simulated(&'static str),
}
