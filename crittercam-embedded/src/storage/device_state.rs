use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use super::{DEVICE_STATE_KEY, LocalStorage};
use crate::Error;

/// Oldest events are dropped beyond this many.
pub const MAX_EVENTS: usize = 50;

/// `[timestamp, kind, message]`, timestamps in Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent(pub i64, pub String, pub String);

impl StateEvent {
    pub fn timestamp(&self) -> i64 {
        self.0
    }

    pub fn kind(&self) -> &str {
        &self.1
    }

    pub fn message(&self) -> &str {
        &self.2
    }
}

/// Counters and recent history that survive deep sleep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    pub boot_count: u32,
    pub first_boot_time: Option<i64>,
    pub last_boot_time: Option<i64>,
    pub last_upload_time: Option<i64>,
    pub last_upload_success: bool,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_error_time: Option<i64>,
    pub wifi_failures: u32,
    pub camera_failures: u32,
    pub successful_uploads: u32,
    pub failed_uploads: u32,
    pub events: Vec<StateEvent>,
}

/// Snapshot of the counters, for the boot log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSummary {
    pub boot_count: u32,
    pub error_count: u32,
    pub wifi_failures: u32,
    pub camera_failures: u32,
    pub successful_uploads: u32,
    pub failed_uploads: u32,
    pub last_upload_success: bool,
}

impl fmt::Display for StateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "boot #{}, {} errors, wifi failures {}, camera failures {}, uploads {} ok / {} failed",
            self.boot_count,
            self.error_count,
            self.wifi_failures,
            self.camera_failures,
            self.successful_uploads,
            self.failed_uploads,
        )
    }
}

impl DeviceState {
    pub fn add_event(&mut self, now: i64, kind: &str, message: &str) {
        self.events.push(StateEvent(now, kind.to_string(), message.to_string()));
        if self.events.len() > MAX_EVENTS {
            let excess = self.events.len() - MAX_EVENTS;
            self.events.drain(..excess);
        }
    }

    pub fn record_boot(&mut self, now: i64) {
        self.boot_count = self.boot_count.saturating_add(1);
        self.first_boot_time.get_or_insert(now);
        self.last_boot_time = Some(now);
        let message = alloc::format!("Boot #{}", self.boot_count);
        self.add_event(now, "boot", &message);
    }

    pub fn record_error(&mut self, now: i64, kind: &str, message: &str) {
        let line = alloc::format!("{}: {}", kind, message);
        self.error_count = self.error_count.saturating_add(1);
        self.last_error_time = Some(now);
        self.add_event(now, "error", &line);
        self.last_error = Some(line);
    }

    pub fn record_wifi_failure(&mut self, now: i64) {
        self.wifi_failures = self.wifi_failures.saturating_add(1);
        self.record_error(now, "wifi", "Failed to connect to WiFi");
    }

    pub fn record_wifi_success(&mut self, now: i64, ssid: &str) {
        self.add_event(now, "wifi", &alloc::format!("Connected to {}", ssid));
    }

    pub fn record_camera_failure(&mut self, now: i64, detail: &str) {
        self.camera_failures = self.camera_failures.saturating_add(1);
        self.record_error(now, "camera", detail);
    }

    pub fn record_camera_success(&mut self, now: i64, bytes: usize) {
        self.add_event(now, "camera", &alloc::format!("Captured {} bytes", bytes));
    }

    pub fn record_upload_attempt(&mut self, now: i64, success: bool, error: Option<&str>) {
        self.last_upload_time = Some(now);
        self.last_upload_success = success;
        if success {
            self.successful_uploads = self.successful_uploads.saturating_add(1);
            self.add_event(now, "upload", "Image uploaded");
        } else {
            self.failed_uploads = self.failed_uploads.saturating_add(1);
            self.record_error(now, "upload", error.unwrap_or("Upload failed"));
        }
    }

    /// The last `n` events, oldest first.
    pub fn recent_events(&self, n: usize) -> &[StateEvent] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    /// The last `n` error events, oldest first.
    pub fn error_log(&self, n: usize) -> Vec<&StateEvent> {
        let errors: Vec<&StateEvent> = self.events.iter().filter(|event| event.kind() == "error").collect();
        let start = errors.len().saturating_sub(n);
        errors[start..].to_vec()
    }

    pub fn status(&self) -> StateSummary {
        StateSummary {
            boot_count: self.boot_count,
            error_count: self.error_count,
            wifi_failures: self.wifi_failures,
            camera_failures: self.camera_failures,
            successful_uploads: self.successful_uploads,
            failed_uploads: self.failed_uploads,
            last_upload_success: self.last_upload_success,
        }
    }
}

/// Loads and checkpoints [`DeviceState`] through a [`LocalStorage`] backend.
///
/// Persistence problems never interrupt a cycle; they are logged and the
/// in-memory copy stays authoritative.
pub struct DeviceStateLog<S: LocalStorage> {
    storage: S,
    state: DeviceState,
}

impl<S: LocalStorage> DeviceStateLog<S> {
    pub async fn load(storage: S) -> Self {
        let state = match storage.get_item(DEVICE_STATE_KEY).await {
            Ok(Some(data)) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Device state unreadable ({}), starting fresh", e);
                DeviceState::default()
            }),
            Ok(None) => DeviceState::default(),
            Err(e) => {
                log::warn!("Failed to read device state: {:?}", e);
                DeviceState::default()
            }
        };
        Self { storage, state }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Applies `update` and writes the result back.
    pub async fn checkpoint(&mut self, update: impl FnOnce(&mut DeviceState)) {
        update(&mut self.state);
        self.save().await;
    }

    pub async fn save(&mut self) {
        let data = match serde_json::to_string(&self.state) {
            Ok(data) => data,
            Err(e) => {
                log::error!("{}: device state: {}", Error::SerializationError, e);
                return;
            }
        };
        if let Err(e) = self.storage.set_item(DEVICE_STATE_KEY, &data).await {
            log::error!("Failed to save device state: {:?}", e);
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::MemoryStorage;

    use super::*;

    #[test]
    fn test_events_are_capped() {
        let mut state = DeviceState::default();
        for i in 0..60 {
            state.add_event(i, "tick", "t");
        }
        assert_eq!(state.events.len(), MAX_EVENTS);
        assert_eq!(state.events[0].0, 10);
    }

    #[test]
    fn test_failure_counters() {
        let mut state = DeviceState::default();
        state.record_wifi_failure(1);
        state.record_camera_failure(2, "init failed");
        assert_eq!(state.wifi_failures, 1);
        assert_eq!(state.camera_failures, 1);
        assert_eq!(state.error_count, 2);
        assert_eq!(state.last_error.as_deref(), Some("camera: init failed"));

        state.record_upload_attempt(3, true, None);
        assert_eq!(state.successful_uploads, 1);
        assert!(state.last_upload_success);
        assert_eq!(state.last_upload_time, Some(3));

        state.record_upload_attempt(4, false, Some("HTTP 502"));
        assert_eq!(state.failed_uploads, 1);
        assert!(!state.last_upload_success);
        assert_eq!(state.last_error.as_deref(), Some("upload: HTTP 502"));
    }

    #[test]
    fn test_first_boot_time_sticks() {
        let mut state = DeviceState::default();
        state.record_boot(10);
        state.record_boot(20);
        assert_eq!(state.first_boot_time, Some(10));
        assert_eq!(state.last_boot_time, Some(20));
        assert_eq!(state.status().boot_count, 2);
    }

    #[test]
    fn test_recent_events_and_error_log() {
        let mut state = DeviceState::default();
        state.record_boot(1);
        state.record_wifi_failure(2);
        state.record_camera_success(3, 4096);
        state.record_camera_failure(4, "empty frame");

        let recent: Vec<&str> = state.recent_events(2).iter().map(StateEvent::message).collect();
        assert_eq!(recent, ["Captured 4096 bytes", "camera: empty frame"]);
        assert_eq!(state.recent_events(100).len(), 4);

        let errors = state.error_log(5);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].timestamp(), 2);
        assert_eq!(state.error_log(1)[0].message(), "camera: empty frame");
    }

    #[test]
    fn test_events_serialize_as_triples() {
        let mut state = DeviceState::default();
        state.add_event(5, "boot", "Boot #1");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["events"][0], serde_json::json!([5, "boot", "Boot #1"]));
    }

    #[tokio::test]
    async fn test_checkpoint_round_trips_through_storage() {
        let mut log = DeviceStateLog::load(MemoryStorage::new()).await;
        log.checkpoint(|state| state.record_boot(100)).await;

        let stored = log.storage().peek(DEVICE_STATE_KEY).unwrap().to_string();
        let reloaded = DeviceStateLog::load(MemoryStorage::new().with_item(DEVICE_STATE_KEY, &stored)).await;
        assert_eq!(reloaded.state().boot_count, 1);
        assert_eq!(reloaded.state().events[0].kind(), "boot");
    }

    #[tokio::test]
    async fn test_corrupt_state_starts_fresh() {
        let log = DeviceStateLog::load(MemoryStorage::new().with_item(DEVICE_STATE_KEY, "{oops")).await;
        assert_eq!(log.state(), &DeviceState::default());
    }

    #[tokio::test]
    async fn test_missing_fields_take_defaults() {
        let storage = MemoryStorage::new().with_item(DEVICE_STATE_KEY, r#"{"boot_count": 9}"#);
        let log = DeviceStateLog::load(storage).await;
        assert_eq!(log.state().boot_count, 9);
        assert!(log.state().events.is_empty());
    }
}
