pub mod json;

pub use json::JsonProtocol;

#[derive(Debug)]
pub enum Error {
    /// Serialization error
    Serialization(alloc::string::String),
    /// Deserialization error
    Deserialization(alloc::string::String),
    /// Payload had the wrong shape
    UnexpectedShape(&'static str),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Serialization(e) => write!(f, "Serialization error: {}", e),
            Error::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            Error::UnexpectedShape(expected) => write!(f, "Expected {}", expected),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

pub trait Protocol: Send + Sync {
    /// Serialize data into bytes
    fn serialize<T: serde::Serialize>(&self, data: &T) -> Result<alloc::vec::Vec<u8>>;

    /// Deserialize bytes into data
    fn deserialize<T: for<'de> serde::Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T>;

    /// Get protocol name
    fn name(&self) -> &'static str;
}
