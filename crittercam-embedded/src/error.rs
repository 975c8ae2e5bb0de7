use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    ConnectivityFailure,
    ConfigFetchFailure,
    PeripheralFailure,
    UploadFailure,
    UpdateFailure,
    StorageError,
    SerializationError,
    TimeoutError,
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectivityFailure => write!(f, "No network connectivity"),
            Error::ConfigFetchFailure => write!(f, "Configuration fetch failed"),
            Error::PeripheralFailure => write!(f, "Camera peripheral failure"),
            Error::UploadFailure => write!(f, "Image upload failed"),
            Error::UpdateFailure => write!(f, "Firmware update failed"),
            Error::StorageError => write!(f, "Storage error"),
            Error::SerializationError => write!(f, "Serialization error"),
            Error::TimeoutError => write!(f, "Timeout error"),
            Error::InvalidState => write!(f, "Invalid state"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
