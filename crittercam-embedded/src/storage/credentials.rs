use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::{Error, Result};

use super::{CREDENTIALS_KEY, LocalStorage};

/// A saved network profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: String,
    pub secret: String,
}

impl Credential {
    pub fn new(ssid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            secret: secret.into(),
        }
    }
}

/// Ordered profile list, one `ssid;secret` record per line.
///
/// Order is first-insertion order; updating a profile keeps its slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialProfiles {
    entries: Vec<Credential>,
}

impl CredentialProfiles {
    pub fn parse(data: &str) -> Self {
        let mut profiles = Self::default();
        for (index, line) in data.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            match line.split_once(';') {
                Some((ssid, secret)) if !ssid.is_empty() => profiles.upsert(Credential::new(ssid, secret)),
                _ => log::warn!("Skipping malformed profile record on line {}", index + 1),
            }
        }
        profiles
    }

    pub fn serialize(&self) -> String {
        let mut data = String::new();
        for entry in &self.entries {
            data.push_str(&entry.ssid);
            data.push(';');
            data.push_str(&entry.secret);
            data.push('\n');
        }
        data
    }

    pub fn upsert(&mut self, credential: Credential) {
        match self.entries.iter_mut().find(|e| e.ssid == credential.ssid) {
            Some(existing) => existing.secret = credential.secret,
            None => self.entries.push(credential),
        }
    }

    pub fn get(&self, ssid: &str) -> Option<&Credential> {
        self.entries.iter().find(|e| e.ssid == ssid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Persists network profiles through a [`LocalStorage`] backend.
pub struct CredentialStore<S: LocalStorage> {
    storage: S,
}

impl<S: LocalStorage> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Missing or unreadable records read as an empty list.
    pub async fn load(&self) -> CredentialProfiles {
        match self.storage.get_item(CREDENTIALS_KEY).await {
            Ok(Some(data)) => CredentialProfiles::parse(&data),
            Ok(None) => CredentialProfiles::default(),
            Err(e) => {
                log::warn!("Failed to read saved profiles: {:?}", e);
                CredentialProfiles::default()
            }
        }
    }

    /// Adds or replaces the profile for `ssid`.
    pub async fn remember(&mut self, ssid: &str, secret: &str) -> Result<()> {
        if ssid.is_empty() || ssid.contains([';', '\n', '\r']) || secret.contains(['\n', '\r']) {
            log::warn!("Refusing to store profile with unrepresentable SSID or secret");
            return Err(Error::StorageError);
        }

        let mut profiles = self.load().await;
        profiles.upsert(Credential::new(ssid.to_string(), secret.to_string()));

        self.storage
            .set_item(CREDENTIALS_KEY, &profiles.serialize())
            .await
            .map_err(|e| {
                log::error!("Failed to write profiles: {:?}", e);
                Error::StorageError
            })?;

        log::info!("Saved profile for '{}' ({} total)", ssid, profiles.len());
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
