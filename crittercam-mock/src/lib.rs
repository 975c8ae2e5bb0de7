use crittercam_api::FirmwareVersion;
use crittercam_embedded::camera::CaptureUploadPipeline;
use crittercam_embedded::network::ConnectivityManager;
use crittercam_embedded::orchestrator::{BootExit, BootOrchestrator, Platform};
use crittercam_embedded::storage::DeviceStateLog;
use embassy_time::Duration;

use crate::settings::Settings;

mod error;
pub mod settings;
mod simulate;
mod storage;

pub use error::MockError;
pub use simulate::*;
pub use storage::FileStorage;

/// A CritterCam board simulated on the host.
pub struct SimulatedBoard;

impl Platform for SimulatedBoard {
    type Storage = FileStorage;
    type Wifi = SimWifi;
    type Portal = SimPortal;
    type Camera = SimCamera;
    type Coordinator = SimCoordinator;
    type Updater = SimUpdater;
    type Clock = SimClock;
    type Power = SimPower;
}

fn parse_version(field: &'static str, value: &str) -> Result<FirmwareVersion, MockError> {
    value.parse().map_err(|e| MockError::InvalidSetting {
        field,
        reason: format!("{e}"),
    })
}

pub async fn build(settings: &Settings) -> Result<BootOrchestrator<SimulatedBoard>, MockError> {
    let data_dir = settings.data_dir();
    let network = &settings.network;

    let connectivity = ConnectivityManager::new(
        FileStorage::new(&data_dir),
        SimWifi::new(&network.access_points),
        SimPortal::new(network.portal_submission.clone()),
    )
    .with_access_point(&network.ap_ssid, &network.ap_password)
    .with_attempt_timeout(Duration::from_millis(network.attempt_timeout_ms))
    .with_retry_delay(Duration::from_millis(network.retry_delay_ms))
    .with_provisioning_window(Duration::from_millis(network.provisioning_window_ms))
    .with_request_timeout(Duration::from_millis(network.request_timeout_ms));

    let pipeline = CaptureUploadPipeline::new(SimCamera::new(&settings.camera))
        .with_stabilize_delay(Duration::from_millis(settings.camera.stabilize_delay_ms));

    let current = parse_version("device.firmware_version", &settings.device.firmware_version)?;
    let latest = settings
        .coordinator
        .latest_firmware
        .as_deref()
        .map(|version| parse_version("coordinator.latest_firmware", version))
        .transpose()?;

    let state_log = DeviceStateLog::load(FileStorage::new(&data_dir)).await;

    Ok(BootOrchestrator::new(
        connectivity,
        pipeline,
        SimCoordinator::new(settings.coordinator.clone()),
        SimUpdater::new(current, latest),
        SimClock::new(settings.clock.sync_fails),
        SimPower::new(settings.device.wake_reason),
        state_log,
    ))
}

/// Simulates one wake cycle of the board.
pub async fn run(settings: &Settings) -> Result<BootExit, MockError> {
    let mut orchestrator = build(settings).await?;

    tracing::info!(
        "Simulating {:?} wake, data in {}",
        settings.device.wake_reason,
        settings.device.data_dir
    );

    Ok(orchestrator.boot().await)
}
