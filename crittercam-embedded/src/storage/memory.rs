use core::convert::Infallible;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

use super::LocalStorage;

/// Volatile storage, lost on every deep sleep.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn peek(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

impl LocalStorage for MemoryStorage {
    type Error = Infallible;

    async fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.data.get(key).cloned())
    }

    async fn set_item(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&mut self, key: &str) -> Result<(), Self::Error> {
        self.data.remove(key);
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), Self::Error> {
        self.data.clear();
        Ok(())
    }
}
