use std::future::pending;
use std::net::Ipv4Addr;
use std::time::Duration;

use crittercam_api::protocols::{JsonProtocol, Protocol};
use crittercam_api::{DeviceStatus, FirmwareVersion, WakeReason};
use crittercam_embedded::camera::{CameraDriver, CameraSettings};
use crittercam_embedded::clock::{Clock, DEVICE_EPOCH_OFFSET_SECS};
use crittercam_embedded::coordinator::{
    CoordinatorClient, FirmwareUpdater, ImageUploader, UpdateOutcome,
};
use crittercam_embedded::network::{AccessPoint, PortalServer, WifiController, WifiEncryption};
use crittercam_embedded::power::PowerControl;
use crittercam_embedded::scheduler::SleepDuration;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::MockError;
use crate::settings::{self, AccessPointSettings, CameraMode, Credentials};

const ASSOCIATION_DELAY: Duration = Duration::from_millis(100);
const VISITOR_DELAY: Duration = Duration::from_millis(200);

pub struct SimWifi {
    access_points: Vec<AccessPointSettings>,
    connected: Option<usize>,
    ap_running: bool,
}

impl SimWifi {
    pub fn new(access_points: &[AccessPointSettings]) -> Self {
        Self {
            access_points: access_points.to_vec(),
            connected: None,
            ap_running: false,
        }
    }

    pub fn connected_ssid(&self) -> Option<&str> {
        self.connected.map(|i| self.access_points[i].ssid.as_str())
    }
}

impl WifiController for SimWifi {
    type Error = MockError;

    async fn start_ap(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        tracing::info!("Access point '{ssid}' up");
        self.ap_running = true;
        Ok(())
    }

    async fn stop_ap(&mut self) -> Result<(), Self::Error> {
        tracing::info!("Access point down");
        self.ap_running = false;
        Ok(())
    }

    async fn scan(&mut self) -> Result<Vec<AccessPoint>, Self::Error> {
        Ok(self
            .access_points
            .iter()
            .map(|ap| AccessPoint {
                ssid: ap.ssid.clone(),
                rssi: ap.rssi,
                encryption: if ap.password.is_empty() {
                    WifiEncryption::None
                } else {
                    WifiEncryption::WPA2
                },
            })
            .collect())
    }

    async fn connect_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        sleep(ASSOCIATION_DELAY).await;
        let index = self
            .access_points
            .iter()
            .position(|ap| ap.ssid == ssid)
            .ok_or(MockError::Simulated("association"))?;
        if self.access_points[index].password != password {
            return Err(MockError::Simulated("authentication"));
        }
        self.connected = Some(index);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    fn signal_strength(&self) -> Option<i8> {
        self.connected.map(|i| self.access_points[i].rssi)
    }
}

/// Plays a visitor who opens the setup page and submits the configured credentials.
pub struct SimPortal {
    submission: Option<Credentials>,
    served: u8,
    running: bool,
    responses: Vec<String>,
}

impl SimPortal {
    pub fn new(submission: Option<Credentials>) -> Self {
        Self {
            submission,
            served: 0,
            running: false,
            responses: Vec::new(),
        }
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    fn next_visitor_request(&self) -> Option<String> {
        let credentials = self.submission.as_ref()?;
        match self.served {
            0 => Some("GET / HTTP/1.1\r\nHost: 192.168.4.1\r\n\r\n".to_string()),
            1 => Some(format!(
                "POST /configure HTTP/1.1\r\nHost: 192.168.4.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nssid={}&other_ssid=&password={}",
                form_encode(&credentials.ssid),
                form_encode(&credentials.password)
            )),
            _ => None,
        }
    }
}

fn form_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => encoded.push(byte as char),
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

impl PortalServer for SimPortal {
    type Error = MockError;

    async fn start(&mut self, address: Ipv4Addr) -> Result<(), Self::Error> {
        tracing::info!("Captive portal listening on {address}:80");
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Self::Error> {
        self.running = false;
        Ok(())
    }

    async fn next_request(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.running {
            return Err(MockError::Simulated("portal listener"));
        }
        let Some(request) = self.next_visitor_request() else {
            return pending().await;
        };
        sleep(VISITOR_DELAY).await;
        self.served += 1;

        let len = request.len().min(buffer.len());
        buffer[..len].copy_from_slice(&request.as_bytes()[..len]);
        Ok(len)
    }

    async fn read_more(&mut self, _buffer: &mut [u8]) -> Result<usize, Self::Error> {
        pending().await
    }

    async fn respond(&mut self, response: &[u8]) -> Result<(), Self::Error> {
        let response = String::from_utf8_lossy(response).into_owned();
        tracing::debug!("Portal response: {}", response.lines().next().unwrap_or_default());
        self.responses.push(response);
        Ok(())
    }
}

pub struct SimCamera {
    mode: CameraMode,
    frame_bytes: usize,
    powered: bool,
    deinit_count: u32,
    last_settings: Option<CameraSettings>,
}

impl SimCamera {
    pub fn new(settings: &settings::Camera) -> Self {
        Self {
            mode: settings.mode,
            frame_bytes: settings.frame_bytes,
            powered: false,
            deinit_count: 0,
            last_settings: None,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn deinit_count(&self) -> u32 {
        self.deinit_count
    }

    pub fn last_settings(&self) -> Option<&CameraSettings> {
        self.last_settings.as_ref()
    }
}

impl CameraDriver for SimCamera {
    type Error = MockError;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.mode == CameraMode::InitFailure {
            return Err(MockError::Simulated("camera init"));
        }
        self.powered = true;
        Ok(())
    }

    fn configure(&mut self, settings: &CameraSettings) -> Result<(), Self::Error> {
        tracing::debug!("Camera configured: {settings:?}");
        self.last_settings = Some(*settings);
        Ok(())
    }

    fn capture(&mut self) -> Result<Vec<u8>, Self::Error> {
        match self.mode {
            CameraMode::Empty => Ok(Vec::new()),
            CameraMode::CaptureError => Err(MockError::Simulated("frame capture")),
            _ => {
                let mut frame = vec![0u8; self.frame_bytes.max(4)];
                frame[..2].copy_from_slice(&[0xFF, 0xD8]);
                let end = frame.len();
                frame[end - 2..].copy_from_slice(&[0xFF, 0xD9]);
                Ok(frame)
            }
        }
    }

    fn deinit(&mut self) -> Result<(), Self::Error> {
        self.powered = false;
        self.deinit_count += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upload {
    pub size: usize,
    pub test_post: bool,
}

pub struct SimCoordinator {
    settings: settings::Coordinator,
    protocol: JsonProtocol,
    uploads: Vec<Upload>,
    reports: Vec<DeviceStatus>,
}

impl SimCoordinator {
    pub fn new(settings: settings::Coordinator) -> Self {
        Self {
            settings,
            protocol: JsonProtocol,
            uploads: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    pub fn reports(&self) -> &[DeviceStatus] {
        &self.reports
    }
}

impl ImageUploader for SimCoordinator {
    type UploadError = MockError;

    async fn upload_image(&mut self, image: &[u8], test_post: bool) -> Result<(), Self::UploadError> {
        if self.settings.upload_fails {
            return Err(MockError::Unreachable);
        }
        tracing::info!("Coordinator received {} byte image (test: {test_post})", image.len());
        self.uploads.push(Upload {
            size: image.len(),
            test_post,
        });
        Ok(())
    }
}

impl CoordinatorClient for SimCoordinator {
    type Error = MockError;

    async fn fetch_config(&mut self) -> Result<Option<Value>, Self::Error> {
        if self.settings.fetch_fails {
            return Err(MockError::Unreachable);
        }
        match &self.settings.config {
            Some(body) => Ok(Some(Value::Object(self.protocol.decode_mapping(body.as_bytes())?))),
            None => Ok(None),
        }
    }

    async fn report_status(&mut self, status: &DeviceStatus) -> Result<(), Self::Error> {
        if self.settings.report_fails {
            return Err(MockError::Unreachable);
        }
        let body = self.protocol.serialize(status)?;
        tracing::info!("Coordinator received status: {}", String::from_utf8_lossy(&body));
        self.reports.push(status.clone());
        Ok(())
    }
}

pub struct SimUpdater {
    current: FirmwareVersion,
    latest: Option<FirmwareVersion>,
}

impl SimUpdater {
    pub fn new(current: FirmwareVersion, latest: Option<FirmwareVersion>) -> Self {
        Self { current, latest }
    }
}

impl FirmwareUpdater for SimUpdater {
    type Error = MockError;

    fn current_version(&self) -> FirmwareVersion {
        self.current
    }

    async fn check_and_apply(&mut self) -> Result<UpdateOutcome, Self::Error> {
        match self.latest {
            Some(latest) if latest > self.current => {
                tracing::info!("Flashing firmware {latest} to the inactive slot");
                Ok(UpdateOutcome::Applied(latest))
            }
            _ => Ok(UpdateOutcome::UpToDate),
        }
    }
}

pub struct SimClock {
    sync_fails: bool,
}

impl SimClock {
    pub fn new(sync_fails: bool) -> Self {
        Self { sync_fails }
    }
}

impl Clock for SimClock {
    type Error = MockError;

    fn now_local_seconds(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() - DEVICE_EPOCH_OFFSET_SECS
    }

    async fn synchronize(&mut self) -> Result<(), Self::Error> {
        if self.sync_fails {
            return Err(MockError::Simulated("ntp"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRequest {
    DeepSleep(SleepDuration),
    Reset,
}

pub struct SimPower {
    wake_reason: WakeReason,
    requests: Vec<PowerRequest>,
}

impl SimPower {
    pub fn new(wake_reason: WakeReason) -> Self {
        Self {
            wake_reason,
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[PowerRequest] {
        &self.requests
    }
}

impl PowerControl for SimPower {
    fn wake_reason(&self) -> WakeReason {
        self.wake_reason
    }

    fn deep_sleep(&mut self, duration: SleepDuration) {
        tracing::info!("Entering deep sleep for {duration}");
        self.requests.push(PowerRequest::DeepSleep(duration));
    }

    fn reset(&mut self) {
        tracing::warn!("Reset requested");
        self.requests.push(PowerRequest::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_encode() {
        assert_eq!(form_encode("Barn & Stable"), "Barn+%26+Stable");
        assert_eq!(form_encode("p@ss;word"), "p%40ss%3Bword");
    }

    #[tokio::test]
    async fn test_visitor_requests() {
        let mut portal = SimPortal::new(Some(Credentials {
            ssid: "Meadow".into(),
            password: "hedgehog".into(),
        }));
        let mut buffer = [0u8; 512];

        assert!(portal.next_request(&mut buffer).await.is_err());
        portal.start(Ipv4Addr::new(192, 168, 4, 1)).await.unwrap();

        let len = portal.next_request(&mut buffer).await.unwrap();
        assert!(buffer[..len].starts_with(b"GET / HTTP/1.1"));
        let len = portal.next_request(&mut buffer).await.unwrap();
        assert!(buffer[..len].ends_with(b"ssid=Meadow&other_ssid=&password=hedgehog"));
    }

    #[test]
    fn test_camera_frame_shape() {
        let mut camera = SimCamera::new(&settings::Camera {
            mode: CameraMode::Ok,
            frame_bytes: 16,
            stabilize_delay_ms: 0,
        });
        camera.init().unwrap();
        let frame = camera.capture().unwrap();
        assert_eq!(frame.len(), 16);
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        assert_eq!(&frame[14..], &[0xFF, 0xD9]);
        camera.deinit().unwrap();
        assert!(!camera.is_powered());
    }
}
