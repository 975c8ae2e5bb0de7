use alloc::string::String;
use alloc::vec::Vec;

use crittercam_api::{DeviceStatus, WakeReason};
use embassy_time::{Duration, Instant, with_timeout};
use serde_json::Value;

use crate::camera::{CameraDriver, CaptureOutcome, CaptureUploadPipeline};
use crate::clock::{Clock, ClockConverter};
use crate::config::{ConfigNormalizer, DeviceConfig};
use crate::coordinator::{CoordinatorClient, FirmwareUpdater, UpdateOutcome};
use crate::network::{ConnectionResult, ConnectivityManager, NetworkLink, PortalServer, WifiController};
use crate::power::PowerControl;
use crate::scheduler::{ScheduleSource, SleepDuration, WakeScheduler};
use crate::storage::{DeviceStateLog, LocalStorage};
use crate::{Error, Result};

pub const CONFIG_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const STATUS_REPORT_TIMEOUT: Duration = Duration::from_secs(10);
pub const TIME_SYNC_TIMEOUT: Duration = Duration::from_secs(10);
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(180);

/// The concrete collaborators of a board.
pub trait Platform {
    type Storage: LocalStorage;
    type Wifi: WifiController;
    type Portal: PortalServer;
    type Camera: CameraDriver;
    type Coordinator: CoordinatorClient;
    type Updater: FirmwareUpdater;
    type Clock: Clock;
    type Power: PowerControl;
}

/// Phases of one wake cycle, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootState {
    Start,
    AcquiringConnectivity,
    FetchingConfig,
    Capturing,
    ReportingStatus,
    CheckingUpdate,
    Scheduling,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    ConnectivityFailure,
    TestMode,
    Scheduled(ScheduleSource),
}

/// What happened during a cycle, up to the suspend request.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub wake_reason: WakeReason,
    pub visited: Vec<BootState>,
    pub link: Option<NetworkLink>,
    pub config: Option<DeviceConfig>,
    pub capture: Option<CaptureOutcome>,
    pub status_reported: bool,
    pub update: Option<UpdateOutcome>,
    pub sleep: SleepDuration,
    pub reason: SuspendReason,
    /// Time since the orchestrator was built, i.e. since boot.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootExit {
    Suspended(CycleReport),
    Reset(Error),
}

pub struct BootOrchestrator<P: Platform> {
    state: BootState,
    visited: Vec<BootState>,
    connectivity: ConnectivityManager<P::Storage, P::Wifi, P::Portal>,
    pipeline: CaptureUploadPipeline<P::Camera>,
    coordinator: P::Coordinator,
    updater: P::Updater,
    clock: P::Clock,
    power: P::Power,
    state_log: DeviceStateLog<P::Storage>,
    booted_at: Instant,
}

impl<P: Platform> BootOrchestrator<P> {
    pub fn new(
        connectivity: ConnectivityManager<P::Storage, P::Wifi, P::Portal>,
        pipeline: CaptureUploadPipeline<P::Camera>,
        coordinator: P::Coordinator,
        updater: P::Updater,
        clock: P::Clock,
        power: P::Power,
        state_log: DeviceStateLog<P::Storage>,
    ) -> Self {
        Self {
            state: BootState::Start,
            visited: alloc::vec![BootState::Start],
            connectivity,
            pipeline,
            coordinator,
            updater,
            clock,
            power,
            state_log,
            booted_at: Instant::now(),
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    pub fn power(&self) -> &P::Power {
        &self.power
    }

    pub fn coordinator(&self) -> &P::Coordinator {
        &self.coordinator
    }

    pub fn pipeline(&self) -> &CaptureUploadPipeline<P::Camera> {
        &self.pipeline
    }

    pub fn connectivity(&self) -> &ConnectivityManager<P::Storage, P::Wifi, P::Portal> {
        &self.connectivity
    }

    pub fn state_log(&self) -> &DeviceStateLog<P::Storage> {
        &self.state_log
    }

    /// Runs the cycle and suspends, or resets the board if the cycle cannot complete.
    pub async fn boot(&mut self) -> BootExit {
        match self.run_cycle().await {
            Ok(report) => BootExit::Suspended(report),
            Err(e) => {
                log::error!("Boot cycle aborted in {:?}: {}, resetting", self.state, e);
                let now = self.unix_now();
                let message = alloc::format!("{} in {:?}", e, self.state);
                self.state_log
                    .checkpoint(|state| state.record_error(now, "boot", &message))
                    .await;
                self.power.reset();
                BootExit::Reset(e)
            }
        }
    }

    /// Drives one wake cycle from connectivity to the suspend request.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let wake_reason = self.power.wake_reason();
        let interactive = wake_reason.allows_provisioning();
        log::info!(
            "Wake reason {:?}, firmware {}",
            wake_reason,
            self.updater.current_version()
        );

        self.transition_to(BootState::AcquiringConnectivity)?;
        let now = self.unix_now();
        self.state_log.checkpoint(|state| state.record_boot(now)).await;
        log::info!("Device state: {}", self.state_log.state().status());

        let mut report = CycleReport {
            wake_reason,
            visited: Vec::new(),
            link: None,
            config: None,
            capture: None,
            status_reported: false,
            update: None,
            sleep: SleepDuration::DEFAULT,
            reason: SuspendReason::Scheduled(ScheduleSource::Default),
            elapsed_ms: 0,
        };

        let link = match self.connectivity.acquire(interactive).await {
            ConnectionResult::Connected(link) => link,
            ConnectionResult::Failed => {
                log::error!(
                    "{}, retrying in {}",
                    Error::ConnectivityFailure,
                    SleepDuration::CONNECTIVITY_FAILURE
                );
                let now = self.unix_now();
                self.state_log.checkpoint(|state| state.record_wifi_failure(now)).await;
                return self.suspend(report, SleepDuration::CONNECTIVITY_FAILURE, SuspendReason::ConnectivityFailure).await;
            }
        };
        let now = self.unix_now();
        self.state_log
            .checkpoint(|state| state.record_wifi_success(now, &link.ssid))
            .await;
        self.synchronize_clock().await;
        report.link = Some(link);

        self.transition_to(BootState::FetchingConfig)?;
        let raw = self.fetch_config().await;
        let config = ConfigNormalizer::normalize(raw.as_ref());
        log::info!(
            "Config: test mode {}, weather {}, next wake-up {:?}",
            config.test_mode,
            config.weather_condition,
            config.next_wakeup_absolute_ms
        );
        report.config = Some(config);

        self.transition_to(BootState::Capturing)?;
        let is_test_upload = config.test_mode || interactive;
        let outcome = self
            .pipeline
            .run(&mut self.coordinator, config.weather_condition, is_test_upload)
            .await;
        self.record_capture(&outcome).await;

        self.transition_to(BootState::ReportingStatus)?;
        let status = self.build_status(&report, &config, &outcome);
        report.status_reported = self.report_status(&status).await;
        report.capture = Some(outcome);

        self.transition_to(BootState::CheckingUpdate)?;
        if config.test_mode {
            log::info!("Test mode, skipping firmware update check");
        } else {
            report.update = self.check_update().await;
        }

        self.transition_to(BootState::Scheduling)?;
        let (sleep, reason) = if config.test_mode {
            (SleepDuration::TEST_MODE, SuspendReason::TestMode)
        } else {
            let plan = WakeScheduler::plan(&config, self.clock.now_local_seconds());
            (plan.duration, SuspendReason::Scheduled(plan.source))
        };

        self.suspend(report, sleep, reason).await
    }

    fn transition_to(&mut self, next: BootState) -> Result<()> {
        if next <= self.state {
            log::error!("Illegal boot transition: {:?} -> {:?}", self.state, next);
            return Err(Error::InvalidState);
        }
        log::debug!("Boot state transition: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.visited.push(next);
        Ok(())
    }

    fn unix_now(&self) -> i64 {
        ClockConverter::to_unix_seconds(self.clock.now_local_seconds())
    }

    async fn synchronize_clock(&mut self) {
        match with_timeout(TIME_SYNC_TIMEOUT, self.clock.synchronize()).await {
            Ok(Ok(())) => match ClockConverter::to_utc(self.clock.now_local_seconds()) {
                Some(utc) => log::info!("Clock synchronized: {}", utc),
                None => log::info!("Clock synchronized"),
            },
            Ok(Err(e)) => log::warn!("Time sync failed, keeping RTC time: {:?}", e),
            Err(_) => log::warn!("Time sync timed out, keeping RTC time"),
        }
    }

    async fn fetch_config(&mut self) -> Option<Value> {
        match with_timeout(CONFIG_FETCH_TIMEOUT, self.coordinator.fetch_config()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                log::warn!("{}: {:?}", Error::ConfigFetchFailure, e);
                None
            }
            Err(_) => {
                log::warn!("{}: timed out", Error::ConfigFetchFailure);
                None
            }
        }
    }

    async fn record_capture(&mut self, outcome: &CaptureOutcome) {
        let now = self.unix_now();
        match outcome {
            CaptureOutcome::Success { size } => {
                let size = *size;
                self.state_log
                    .checkpoint(|state| {
                        state.record_camera_success(now, size);
                        state.record_upload_attempt(now, true, None);
                    })
                    .await;
            }
            CaptureOutcome::EmptyArtifact | CaptureOutcome::PeripheralError(_) => {
                let detail = outcome.detail().unwrap_or_default();
                self.state_log
                    .checkpoint(|state| state.record_camera_failure(now, &detail))
                    .await;
            }
            CaptureOutcome::UploadError(detail) => {
                self.state_log
                    .checkpoint(|state| state.record_upload_attempt(now, false, Some(detail)))
                    .await;
            }
        }
    }

    fn build_status(&self, report: &CycleReport, config: &DeviceConfig, outcome: &CaptureOutcome) -> DeviceStatus {
        let state = self.state_log.state();
        DeviceStatus {
            signal_strength: report.link.as_ref().and_then(|link| link.signal_strength),
            firmware_version: self.updater.current_version(),
            image_send_successful: outcome.is_success(),
            wake_reason: report.wake_reason,
            running_in_test_mode: config.test_mode,
            weather_condition: config.weather_condition,
            next_wakeup_time_ms: config.next_wakeup_absolute_ms,
            boot_count: state.boot_count,
            last_error: state.last_error.clone(),
            detail: outcome.detail(),
        }
    }

    async fn report_status(&mut self, status: &DeviceStatus) -> bool {
        match with_timeout(STATUS_REPORT_TIMEOUT, self.coordinator.report_status(status)).await {
            Ok(Ok(())) => {
                log::info!("Status reported");
                true
            }
            Ok(Err(e)) => {
                log::warn!("Status report failed: {:?}", e);
                false
            }
            Err(_) => {
                log::warn!("Status report failed: {}", Error::TimeoutError);
                false
            }
        }
    }

    async fn check_update(&mut self) -> Option<UpdateOutcome> {
        let result = with_timeout(UPDATE_TIMEOUT, self.updater.check_and_apply()).await;
        let now = self.unix_now();
        let failure: String = match result {
            Ok(Ok(outcome)) => {
                if let UpdateOutcome::Applied(version) = outcome {
                    log::info!("Firmware {} staged, active after next boot", version);
                    let message = alloc::format!("Staged firmware {}", version);
                    self.state_log
                        .checkpoint(|state| state.add_event(now, "update", &message))
                        .await;
                } else {
                    log::info!("Firmware is up to date");
                }
                return Some(outcome);
            }
            Ok(Err(e)) => alloc::format!("{:?}", e),
            Err(_) => "timed out".into(),
        };

        log::warn!("{}: {}", Error::UpdateFailure, failure);
        self.state_log
            .checkpoint(|state| state.record_error(now, "update", &failure))
            .await;
        None
    }

    async fn suspend(
        &mut self,
        mut report: CycleReport,
        sleep: SleepDuration,
        reason: SuspendReason,
    ) -> Result<CycleReport> {
        self.transition_to(BootState::Suspended)?;

        let now = self.unix_now();
        let message = alloc::format!("Sleeping {} ({:?})", sleep, reason);
        self.state_log
            .checkpoint(|state| state.add_event(now, "sleep", &message))
            .await;

        report.visited = self.visited.clone();
        report.sleep = sleep;
        report.reason = reason;
        report.elapsed_ms = self.booted_at.elapsed().as_millis();

        log::info!("Cycle done in {} ms, sleeping {}", report.elapsed_ms, sleep);
        self.power.deep_sleep(sleep);
        Ok(report)
    }
}
