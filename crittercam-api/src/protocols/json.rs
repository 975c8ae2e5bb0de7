use alloc::string::String;
use alloc::vec::Vec;

use serde_json::{Map, Value};

use super::{Error, Protocol, Result};

#[derive(Debug, Default, Clone)]
pub struct JsonProtocol;

impl JsonProtocol {
    /// Decodes a configuration body, which must be a JSON object.
    pub fn decode_mapping(&self, bytes: &[u8]) -> Result<Map<String, Value>> {
        match self.deserialize::<Value>(bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::UnexpectedShape("a JSON object")),
        }
    }
}

impl Protocol for JsonProtocol {
    fn serialize<T: serde::Serialize>(&self, data: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(data).map_err(|e| Error::Serialization(alloc::format!("{}", e)))
    }

    fn deserialize<T: for<'de> serde::Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(alloc::format!("{}", e)))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
