use core::fmt::Debug;
use core::future::Future;

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use embassy_time::{Duration, Instant, Timer, with_timeout};

use crate::storage::{CredentialProfiles, CredentialStore, LocalStorage};

use super::{
    AccessPoint, PORTAL_ADDRESS, PortalRequest, PortalRoute, PortalServer, WifiController,
    decode_credentials, http_response, render_result_page, render_setup_page,
};

pub const DEFAULT_AP_SSID: &str = "CritterCam";
pub const DEFAULT_AP_PASSWORD: &str = "crittercam";

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_ATTEMPTS_PER_PROFILE: u8 = 2;
const DEFAULT_MAX_TOTAL_ATTEMPTS: u8 = 8;
const DEFAULT_PROVISIONING_WINDOW: Duration = Duration::from_secs(300);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const LINK_POLL_INTERVAL: Duration = Duration::from_millis(100);
const PORTAL_ERROR_BACKOFF: Duration = Duration::from_millis(500);
/// Pause after an empty or non-HTTP request so dropped clients cannot spin the loop.
const PORTAL_IGNORED_BACKOFF: Duration = Duration::from_millis(100);
const MAX_PORTAL_ERRORS: u8 = 10;
const PORTAL_BUFFER_LEN: usize = 1024;
const PORTAL_BODY_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityState {
    Idle,
    Scanning,
    Connecting { attempt: u8 },
    Provisioning,
    Connected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLink {
    pub ssid: String,
    /// RSSI in dBm, if the radio reports it
    pub signal_strength: Option<i8>,
    /// Whether the credentials came from the portal in this cycle
    pub provisioned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionResult {
    Connected(NetworkLink),
    Failed,
}

impl ConnectionResult {
    pub fn link(&self) -> Option<&NetworkLink> {
        match self {
            ConnectionResult::Connected(link) => Some(link),
            ConnectionResult::Failed => None,
        }
    }
}

/// Brings up station connectivity for one boot cycle.
///
/// Saved profiles are tried first, in the order they were saved. If none of
/// them works and the caller allows it, an access point with a captive
/// portal is opened for a fixed window so that someone nearby can enter new
/// credentials. Every wait is bounded, see [`Self::worst_case_duration`].
pub struct ConnectivityManager<S: LocalStorage, W: WifiController, P: PortalServer> {
    state: ConnectivityState,
    credentials: CredentialStore<S>,
    wifi_controller: W,
    portal: P,
    ap_ssid: String,
    ap_password: String,
    scan_result: Option<Vec<AccessPoint>>,
    attempt_timeout: Duration,
    retry_delay: Duration,
    attempts_per_profile: u8,
    max_total_attempts: u8,
    provisioning_window: Duration,
    request_timeout: Duration,
    scan_timeout: Duration,
}

impl<S: LocalStorage, W: WifiController, P: PortalServer> ConnectivityManager<S, W, P> {
    pub fn new(storage: S, wifi_controller: W, portal: P) -> Self {
        Self {
            state: ConnectivityState::Idle,
            credentials: CredentialStore::new(storage),
            wifi_controller,
            portal,
            ap_ssid: DEFAULT_AP_SSID.to_string(),
            ap_password: DEFAULT_AP_PASSWORD.to_string(),
            scan_result: None,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            attempts_per_profile: DEFAULT_ATTEMPTS_PER_PROFILE,
            max_total_attempts: DEFAULT_MAX_TOTAL_ATTEMPTS,
            provisioning_window: DEFAULT_PROVISIONING_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    pub fn with_access_point(mut self, ssid: &str, password: &str) -> Self {
        self.ap_ssid = ssid.to_string();
        self.ap_password = password.to_string();
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, per_profile: u8, total: u8) -> Self {
        self.attempts_per_profile = per_profile;
        self.max_total_attempts = total;
        self
    }

    pub fn with_provisioning_window(mut self, window: Duration) -> Self {
        self.provisioning_window = window;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn state(&self) -> &ConnectivityState {
        &self.state
    }

    pub fn wifi_controller(&self) -> &W {
        &self.wifi_controller
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.credentials
    }

    /// Upper bound on how long [`Self::acquire`] can take.
    pub fn worst_case_duration(&self, allow_interactive_provisioning: bool) -> Duration {
        let attempts = u32::from(self.max_total_attempts);
        let attempt = self.attempt_timeout + DISCONNECT_TIMEOUT;
        let mut bound = self.scan_timeout + (attempt + self.retry_delay) * attempts;

        if allow_interactive_provisioning {
            // Radio and listener setup plus teardown, the window itself, and
            // one request that arrives just before the window closes.
            let last_request = self.request_timeout * 2 + attempt;
            bound += self.request_timeout * 4 + self.provisioning_window + PORTAL_ERROR_BACKOFF + last_request;
        }

        bound
    }

    pub async fn acquire(&mut self, allow_interactive_provisioning: bool) -> ConnectionResult {
        self.transition_to(ConnectivityState::Scanning);
        let profiles = self.credentials.load().await;
        self.scan_networks().await;

        if let Some(link) = self.join_saved_profiles(&profiles).await {
            return ConnectionResult::Connected(link);
        }

        if allow_interactive_provisioning {
            self.transition_to(ConnectivityState::Provisioning);
            if let Some(link) = self.run_portal().await {
                return ConnectionResult::Connected(link);
            }
        } else {
            log::info!("Scheduled wake, not opening the provisioning portal");
        }

        self.transition_to(ConnectivityState::Failed);
        ConnectionResult::Failed
    }

    fn transition_to(&mut self, new_state: ConnectivityState) {
        log::debug!("WiFi state transition: {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
    }

    async fn scan_networks(&mut self) {
        self.scan_result = bounded(self.scan_timeout, "WiFi scan", self.wifi_controller.scan()).await;

        match &self.scan_result {
            Some(networks) => {
                for network in networks {
                    log::debug!(
                        "Found '{}' ({} dBm, {:?})",
                        network.ssid,
                        network.rssi,
                        network.encryption
                    );
                }
                log::info!("Scan found {} networks", networks.len());
            }
            None => log::warn!("Scan unavailable, trying every saved network"),
        }
    }

    fn is_visible(&self, ssid: &str) -> bool {
        self.scan_result
            .as_ref()
            .is_none_or(|networks| networks.iter().any(|n| n.ssid == ssid))
    }

    fn visible_ssids(&self) -> Vec<String> {
        self.scan_result
            .iter()
            .flatten()
            .map(|network| network.ssid.clone())
            .collect()
    }

    async fn join_saved_profiles(&mut self, profiles: &CredentialProfiles) -> Option<NetworkLink> {
        if profiles.is_empty() {
            log::info!("No saved networks");
            return None;
        }

        let mut attempts = 0u8;
        for credential in profiles.iter() {
            if !self.is_visible(&credential.ssid) {
                log::info!("Saved network '{}' is not in range", credential.ssid);
                continue;
            }

            for _ in 0..self.attempts_per_profile {
                if attempts >= self.max_total_attempts {
                    log::warn!("Gave up after {} connection attempts", attempts);
                    return None;
                }
                if attempts > 0 {
                    Timer::after(self.retry_delay).await;
                }
                attempts += 1;

                self.transition_to(ConnectivityState::Connecting { attempt: attempts });
                if self.attempt_connection(&credential.ssid, &credential.secret).await {
                    return Some(self.link(&credential.ssid, false));
                }
                log::warn!("Connection attempt {} to '{}' failed", attempts, credential.ssid);
            }
        }

        None
    }

    async fn attempt_connection(&mut self, ssid: &str, password: &str) -> bool {
        log::info!("Attempting to connect to WiFi: {}", ssid);

        let wifi = &mut self.wifi_controller;
        let connect = async {
            wifi.connect_station(ssid, password).await?;
            while !wifi.is_connected() {
                Timer::after(LINK_POLL_INTERVAL).await;
            }
            Ok::<(), W::Error>(())
        };
        let connected = bounded(self.attempt_timeout, "WiFi connection", connect)
            .await
            .is_some();

        if !connected {
            bounded(DISCONNECT_TIMEOUT, "WiFi disconnect", self.wifi_controller.disconnect()).await;
        }
        connected
    }

    fn link(&mut self, ssid: &str, provisioned: bool) -> NetworkLink {
        self.transition_to(ConnectivityState::Connected);
        let link = NetworkLink {
            ssid: ssid.to_string(),
            signal_strength: self.wifi_controller.signal_strength(),
            provisioned,
        };
        log::info!("Connected to '{}' ({:?} dBm)", link.ssid, link.signal_strength);
        link
    }

    async fn run_portal(&mut self) -> Option<NetworkLink> {
        let timeout = self.request_timeout;

        bounded(
            timeout,
            "Starting access point",
            self.wifi_controller.start_ap(&self.ap_ssid, &self.ap_password),
        )
        .await?;

        let link = match bounded(timeout, "Starting portal", self.portal.start(PORTAL_ADDRESS)).await {
            Some(()) => {
                log::info!(
                    "Provisioning portal open on '{}' at http://{} for {} s",
                    self.ap_ssid,
                    PORTAL_ADDRESS,
                    self.provisioning_window.as_secs()
                );
                let link = self.serve_portal().await;
                bounded(timeout, "Stopping portal", self.portal.stop()).await;
                link
            }
            None => None,
        };

        bounded(timeout, "Stopping access point", self.wifi_controller.stop_ap()).await;
        link
    }

    async fn serve_portal(&mut self) -> Option<NetworkLink> {
        let deadline = Instant::now() + self.provisioning_window;
        let mut buffer = [0u8; PORTAL_BUFFER_LEN];
        let mut failures = 0u8;

        loop {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("Provisioning window closed without usable credentials");
                return None;
            }

            match with_timeout(deadline - now, self.portal.next_request(&mut buffer)).await {
                Err(_) => {
                    log::warn!("Provisioning window closed without usable credentials");
                    return None;
                }
                Ok(Err(e)) => {
                    failures += 1;
                    log::warn!("Portal request failed: {:?}", e);
                    if failures >= MAX_PORTAL_ERRORS {
                        log::error!("Too many portal errors, closing portal");
                        return None;
                    }
                    Timer::after(PORTAL_ERROR_BACKOFF).await;
                }
                Ok(Ok(len)) => {
                    let len = len.min(buffer.len());
                    let Some(request) = PortalRequest::parse(&buffer[..len]) else {
                        log::debug!("Ignoring non-HTTP request ({} bytes)", len);
                        Timer::after(PORTAL_IGNORED_BACKOFF).await;
                        continue;
                    };
                    if let Some(link) = self.handle_portal_request(request).await {
                        return Some(link);
                    }
                }
            }
        }
    }

    async fn handle_portal_request(&mut self, request: PortalRequest<'_>) -> Option<NetworkLink> {
        log::info!("Portal request: {} /{}", request.method, request.path);

        match request.route {
            PortalRoute::SetupPage => {
                let page = render_setup_page(&self.visible_ssids());
                self.send(200, &page).await;
                None
            }
            PortalRoute::Configure => self.handle_configure(request.body).await,
        }
    }

    async fn handle_configure(&mut self, body: &[u8]) -> Option<NetworkLink> {
        let mut body = body.to_vec();
        if body.is_empty() {
            // Some browsers send the form body in a second segment.
            let mut extra = [0u8; PORTAL_BODY_LEN];
            if let Some(len) =
                bounded(self.request_timeout, "Reading form body", self.portal.read_more(&mut extra)).await
            {
                body.extend_from_slice(&extra[..len.min(extra.len())]);
            }
        }

        let credential = match decode_credentials(&body) {
            Ok(credential) => credential,
            Err(e) => {
                log::warn!("Rejected portal form: {}", e.message());
                self.send(400, e.message()).await;
                return None;
            }
        };

        if !self.attempt_connection(&credential.ssid, &credential.secret).await {
            self.send(200, &render_result_page(&credential.ssid, false)).await;
            return None;
        }

        self.send(200, &render_result_page(&credential.ssid, true)).await;
        if let Err(e) = self.credentials.remember(&credential.ssid, &credential.secret).await {
            log::error!("Connected but could not save the profile: {}", e);
        }
        Some(self.link(&credential.ssid, true))
    }

    async fn send(&mut self, status: u16, body: &str) {
        let response = http_response(status, body);
        bounded(self.request_timeout, "Portal response", self.portal.respond(&response)).await;
    }
}

/// Runs `operation` for at most `timeout`, logging failures.
async fn bounded<T, E: Debug>(
    timeout: Duration,
    what: &str,
    operation: impl Future<Output = Result<T, E>>,
) -> Option<T> {
    match with_timeout(timeout, operation).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log::warn!("{} failed: {:?}", what, e);
            None
        }
        Err(_) => {
            log::warn!("{} timed out after {} ms", what, timeout.as_millis());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use core::future::pending;
    use core::net::Ipv4Addr;

    use alloc::collections::VecDeque;

    use super::*;
    use crate::network::WifiEncryption;
    use crate::storage::{CREDENTIALS_KEY, MemoryStorage};

    type TestManager = ConnectivityManager<MemoryStorage, MockWifiController, MockPortal>;

    #[derive(Debug, Default)]
    struct MockWifiController {
        networks: Vec<(String, String, i8)>,
        connected: Option<String>,
        ap_started: bool,
        hang_on_connect: bool,
        connect_calls: Vec<String>,
    }

    impl MockWifiController {
        fn with_network(mut self, ssid: &str, password: &str, rssi: i8) -> Self {
            self.networks.push((ssid.to_string(), password.to_string(), rssi));
            self
        }
    }

    impl WifiController for MockWifiController {
        type Error = &'static str;

        async fn start_ap(&mut self, _ssid: &str, _password: &str) -> Result<(), Self::Error> {
            self.ap_started = true;
            Ok(())
        }

        async fn stop_ap(&mut self) -> Result<(), Self::Error> {
            self.ap_started = false;
            Ok(())
        }

        async fn scan(&mut self) -> Result<Vec<AccessPoint>, Self::Error> {
            Ok(self
                .networks
                .iter()
                .map(|(ssid, _, rssi)| AccessPoint {
                    ssid: ssid.clone(),
                    rssi: *rssi,
                    encryption: WifiEncryption::WPA2,
                })
                .collect())
        }

        async fn connect_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
            self.connect_calls.push(ssid.to_string());
            if self.hang_on_connect {
                pending::<()>().await;
            }
            match self.networks.iter().find(|(s, _, _)| s == ssid) {
                Some((_, p, _)) if p == password => {
                    self.connected = Some(ssid.to_string());
                    Ok(())
                }
                Some(_) => Err("auth failed"),
                None => Err("no ap found"),
            }
        }

        async fn disconnect(&mut self) -> Result<(), Self::Error> {
            self.connected = None;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.is_some()
        }

        fn signal_strength(&self) -> Option<i8> {
            let ssid = self.connected.as_ref()?;
            self.networks.iter().find(|(s, _, _)| s == ssid).map(|(_, _, rssi)| *rssi)
        }
    }

    #[derive(Debug, Default)]
    struct MockPortal {
        started: Option<Ipv4Addr>,
        stopped: bool,
        requests: VecDeque<Vec<u8>>,
        continuation: Option<Vec<u8>>,
        responses: Vec<String>,
        dropped_connections: bool,
        request_calls: usize,
    }

    impl MockPortal {
        fn with_request(mut self, raw: &str) -> Self {
            self.requests.push_back(raw.as_bytes().to_vec());
            self
        }
    }

    impl PortalServer for MockPortal {
        type Error = &'static str;

        async fn start(&mut self, address: Ipv4Addr) -> Result<(), Self::Error> {
            self.started = Some(address);
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), Self::Error> {
            self.stopped = true;
            Ok(())
        }

        async fn next_request(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
            self.request_calls += 1;
            if self.dropped_connections {
                return Ok(0);
            }
            match self.requests.pop_front() {
                Some(raw) => {
                    buffer[..raw.len()].copy_from_slice(&raw);
                    Ok(raw.len())
                }
                None => pending().await,
            }
        }

        async fn read_more(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
            match self.continuation.take() {
                Some(raw) => {
                    buffer[..raw.len()].copy_from_slice(&raw);
                    Ok(raw.len())
                }
                None => pending().await,
            }
        }

        async fn respond(&mut self, response: &[u8]) -> Result<(), Self::Error> {
            self.responses.push(String::from_utf8_lossy(response).into_owned());
            Ok(())
        }
    }

    fn manager(storage: MemoryStorage, wifi: MockWifiController, portal: MockPortal) -> TestManager {
        ConnectivityManager::new(storage, wifi, portal)
            .with_attempt_timeout(Duration::from_millis(200))
            .with_retry_delay(Duration::from_millis(5))
            .with_provisioning_window(Duration::from_millis(300))
            .with_request_timeout(Duration::from_millis(50))
    }

    fn saved(profiles: &str) -> MemoryStorage {
        MemoryStorage::new().with_item(CREDENTIALS_KEY, profiles)
    }

    #[tokio::test]
    async fn test_joins_saved_profile() {
        let wifi = MockWifiController::default().with_network("home", "pw", -58);
        let mut manager = manager(saved("home;pw\n"), wifi, MockPortal::default());

        let result = manager.acquire(false).await;

        assert_eq!(
            result,
            ConnectionResult::Connected(NetworkLink {
                ssid: "home".into(),
                signal_strength: Some(-58),
                provisioned: false,
            })
        );
        assert_eq!(manager.state(), &ConnectivityState::Connected);
        assert_eq!(manager.wifi_controller().connect_calls, ["home"]);
    }

    #[tokio::test]
    async fn test_profiles_tried_in_saved_order() {
        let wifi = MockWifiController::default()
            .with_network("second", "wrong-on-purpose", -70)
            .with_network("third", "pw3", -40);
        let mut manager = manager(
            saved("first;pw1\nsecond;pw2\nthird;pw3\n"),
            wifi,
            MockPortal::default(),
        );

        let result = manager.acquire(false).await;

        assert_eq!(result.link().map(|l| l.ssid.as_str()), Some("third"));
        // "first" is out of range; "second" rejects the saved secret twice.
        assert_eq!(manager.wifi_controller().connect_calls, ["second", "second", "third"]);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_global() {
        let mut profiles = String::new();
        let mut wifi = MockWifiController::default();
        for i in 0..6 {
            let ssid = alloc::format!("net{}", i);
            profiles.push_str(&alloc::format!("{};stale\n", ssid));
            wifi = wifi.with_network(&ssid, "fresh", -60);
        }
        let mut manager = manager(saved(&profiles), wifi, MockPortal::default());

        let result = manager.acquire(false).await;

        assert_eq!(result, ConnectionResult::Failed);
        assert_eq!(manager.state(), &ConnectivityState::Failed);
        assert_eq!(manager.wifi_controller().connect_calls.len(), 8);
        assert!(manager.portal().started.is_none());
    }

    #[tokio::test]
    async fn test_hung_radio_is_bounded() {
        let wifi = MockWifiController {
            hang_on_connect: true,
            ..MockWifiController::default().with_network("home", "pw", -50)
        };
        let mut manager = manager(saved("home;pw\n"), wifi, MockPortal::default());
        let bound = manager.worst_case_duration(true);

        let started = Instant::now();
        let result = manager.acquire(true).await;

        assert_eq!(result, ConnectionResult::Failed);
        assert_eq!(manager.wifi_controller().connect_calls.len(), 2);
        assert!(started.elapsed() <= bound + Duration::from_millis(100));
        assert!(!manager.wifi_controller().ap_started);
    }

    #[tokio::test]
    async fn test_scheduled_wake_never_opens_portal() {
        let mut manager = manager(MemoryStorage::new(), MockWifiController::default(), MockPortal::default());

        assert_eq!(manager.acquire(false).await, ConnectionResult::Failed);
        assert!(manager.portal().started.is_none());
        assert!(manager.portal().responses.is_empty());
    }

    #[tokio::test]
    async fn test_portal_provisions_and_saves_profile() {
        let wifi = MockWifiController::default()
            .with_network("My Net", "p@ss", -64)
            .with_network("<Neighbour>", "x", -80);
        let portal = MockPortal::default()
            .with_request("GET /hotspot-detect.html HTTP/1.1\r\nHost: captive.apple.com\r\n\r\n")
            .with_request("\x16\x03\x01")
            .with_request("POST /configure HTTP/1.1\r\n\r\nssid=My+Net&password=p%40ss");
        let mut manager = manager(MemoryStorage::new(), wifi, portal);

        let result = manager.acquire(true).await;

        assert_eq!(
            result,
            ConnectionResult::Connected(NetworkLink {
                ssid: "My Net".into(),
                signal_strength: Some(-64),
                provisioned: true,
            })
        );
        let portal = manager.portal();
        assert_eq!(portal.started, Some(PORTAL_ADDRESS));
        assert!(portal.stopped);
        assert_eq!(portal.responses.len(), 2);
        assert!(portal.responses[0].contains("&lt;Neighbour&gt;"));
        assert!(portal.responses[1].contains("<h1>Connected</h1>"));
        assert!(!manager.wifi_controller().ap_started);
        assert_eq!(
            manager.credentials().storage().peek(CREDENTIALS_KEY),
            Some("My Net;p@ss\n")
        );
    }

    #[tokio::test]
    async fn test_portal_reads_split_body() {
        let wifi = MockWifiController::default().with_network("barn", "hay", -71);
        let mut portal = MockPortal::default().with_request("POST /configure HTTP/1.1\r\nContent-Length: 22\r\n\r\n");
        portal.continuation = Some(b"ssid=barn&password=hay".to_vec());
        let mut manager = manager(MemoryStorage::new(), wifi, portal);

        let result = manager.acquire(true).await;

        assert_eq!(result.link().map(|l| l.provisioned), Some(true));
    }

    #[tokio::test]
    async fn test_portal_rejects_bad_forms_until_window_closes() {
        let wifi = MockWifiController::default().with_network("home", "right", -50);
        let portal = MockPortal::default()
            .with_request("POST /configure HTTP/1.1\r\n\r\nssid=&password=x")
            .with_request("POST /configure HTTP/1.1\r\n\r\nfoo=bar")
            .with_request("POST /configure HTTP/1.1\r\n\r\nssid=home&password=wrong");
        let mut manager = manager(MemoryStorage::new(), wifi, portal);

        let result = manager.acquire(true).await;

        assert_eq!(result, ConnectionResult::Failed);
        let responses = &manager.portal().responses;
        assert!(responses[0].starts_with("HTTP/1.0 400") && responses[0].ends_with("SSID must be provided"));
        assert!(responses[1].ends_with("Parameters not found"));
        assert!(responses[2].contains("Could not connect"));
        assert!(manager.portal().stopped);
        assert_eq!(manager.credentials().storage().peek(CREDENTIALS_KEY), None);
    }

    #[tokio::test]
    async fn test_first_boot_without_networks_fails_within_bound() {
        let mut manager = manager(MemoryStorage::new(), MockWifiController::default(), MockPortal::default());
        let bound = manager.worst_case_duration(true);

        let started = Instant::now();
        let result = manager.acquire(true).await;
        let elapsed = started.elapsed();

        assert_eq!(result, ConnectionResult::Failed);
        assert_eq!(manager.state(), &ConnectivityState::Failed);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed <= bound);
        assert_eq!(manager.portal().started, Some(PORTAL_ADDRESS));
        assert!(manager.portal().stopped);
        assert!(manager.portal().responses.is_empty());
        assert!(manager.wifi_controller().connect_calls.is_empty());
        assert_eq!(manager.credentials().storage().peek(CREDENTIALS_KEY), None);
    }

    #[tokio::test]
    async fn test_dropped_portal_connections_back_off() {
        let portal = MockPortal {
            dropped_connections: true,
            ..MockPortal::default()
        };
        let mut manager = manager(MemoryStorage::new(), MockWifiController::default(), portal);

        assert_eq!(manager.acquire(true).await, ConnectionResult::Failed);
        // 300 ms window with a 100 ms pause per ignored request.
        let calls = manager.portal().request_calls;
        assert!((1..=4).contains(&calls), "{} requests polled", calls);
        assert!(manager.portal().responses.is_empty());
    }

    #[test]
    fn test_worst_case_with_defaults() {
        let manager: TestManager = ConnectivityManager::new(
            MemoryStorage::new(),
            MockWifiController::default(),
            MockPortal::default(),
        );
        assert_eq!(manager.worst_case_duration(false), Duration::from_secs(10 + 8 * 25));
        assert!(manager.worst_case_duration(true) < Duration::from_secs(600));
    }
}
