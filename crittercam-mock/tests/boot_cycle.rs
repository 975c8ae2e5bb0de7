use std::fs;
use std::path::PathBuf;

use crittercam_api::{WakeReason, WeatherCondition};
use crittercam_embedded::orchestrator::{BootExit, BootState, CycleReport, SuspendReason};
use crittercam_embedded::scheduler::{ScheduleSource, SleepDuration};
use crittercam_mock::settings::{CameraMode, Settings};
use crittercam_mock::{PowerRequest, build};

fn settings(name: &str) -> Settings {
    let mut settings = Settings::new(None).unwrap();
    let dir = std::env::temp_dir().join(format!("crittercam-it-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    settings.device.data_dir = dir.to_string_lossy().to_string();

    settings.network.attempt_timeout_ms = 500;
    settings.network.retry_delay_ms = 10;
    settings.network.provisioning_window_ms = 2_000;
    settings.network.request_timeout_ms = 200;
    settings.camera.stabilize_delay_ms = 0;
    settings
}

fn data_file(settings: &Settings, name: &str) -> PathBuf {
    settings.data_dir().join(name)
}

fn suspended(exit: BootExit) -> CycleReport {
    match exit {
        BootExit::Suspended(report) => report,
        BootExit::Reset(e) => panic!("unexpected reset: {e}"),
    }
}

#[tokio::test]
async fn test_first_boot_provisions_through_portal() {
    let settings = settings("first-boot");
    let mut orchestrator = build(&settings).await.unwrap();

    let report = suspended(orchestrator.boot().await);

    let link = report.link.clone().unwrap();
    assert_eq!(link.ssid, "Meadow");
    assert!(link.provisioned);
    assert_eq!(report.visited.last(), Some(&BootState::Suspended));
    assert_eq!(report.sleep, SleepDuration::DEFAULT);

    let portal = orchestrator.connectivity().portal();
    assert!(portal.responses()[0].contains("Barn &amp; Stable"));
    assert!(portal.responses()[1].contains("Connected"));

    let uploads = orchestrator.coordinator().uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].test_post);

    let status = &orchestrator.coordinator().reports()[0];
    assert!(status.image_send_successful);
    assert_eq!(status.weather_condition, WeatherCondition::Sunny);
    assert_eq!(status.signal_strength, Some(-61));
    assert_eq!(status.wake_reason, WakeReason::PowerOn);

    let camera = orchestrator.pipeline().camera();
    assert_eq!(camera.deinit_count(), 1);
    assert!(!camera.is_powered());

    assert_eq!(
        fs::read_to_string(data_file(&settings, "wifi.dat")).unwrap(),
        "Meadow;hedgehog\n"
    );
    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_file(&settings, "device_state.json")).unwrap()).unwrap();
    assert_eq!(state["boot_count"], 1);

    assert_eq!(
        orchestrator.power().requests(),
        [PowerRequest::DeepSleep(SleepDuration::DEFAULT)]
    );
}

#[tokio::test]
async fn test_timer_wake_reuses_saved_profile() {
    let mut settings = settings("timer-wake");
    suspended(build(&settings).await.unwrap().boot().await);

    settings.device.wake_reason = WakeReason::Timer;
    settings.network.portal_submission = None;
    let mut orchestrator = build(&settings).await.unwrap();
    let report = suspended(orchestrator.boot().await);

    assert!(!report.link.unwrap().provisioned);
    assert!(orchestrator.connectivity().portal().responses().is_empty());
    assert_eq!(
        orchestrator.connectivity().wifi_controller().connected_ssid(),
        Some("Meadow")
    );
    assert!(!orchestrator.coordinator().uploads()[0].test_post);
    assert_eq!(orchestrator.coordinator().reports()[0].boot_count, 2);
}

#[tokio::test]
async fn test_timer_wake_without_profiles_backs_off() {
    let mut settings = settings("no-profiles");
    settings.device.wake_reason = WakeReason::Timer;

    let mut orchestrator = build(&settings).await.unwrap();
    let report = suspended(orchestrator.boot().await);

    assert_eq!(report.reason, SuspendReason::ConnectivityFailure);
    assert_eq!(report.sleep, SleepDuration::CONNECTIVITY_FAILURE);
    assert!(orchestrator.coordinator().reports().is_empty());
    assert_eq!(orchestrator.pipeline().camera().deinit_count(), 0);
}

#[tokio::test]
async fn test_empty_frame_and_malformed_config() {
    let mut settings = settings("empty-frame");
    settings.camera.mode = CameraMode::Empty;
    settings.coordinator.config = Some("{\"weatherCondition\": ".to_string());

    let mut orchestrator = build(&settings).await.unwrap();
    let report = suspended(orchestrator.boot().await);

    assert_eq!(report.reason, SuspendReason::Scheduled(ScheduleSource::Default));
    assert!(orchestrator.coordinator().uploads().is_empty());
    let status = &orchestrator.coordinator().reports()[0];
    assert!(!status.image_send_successful);
    assert_eq!(status.weather_condition, WeatherCondition::Overcast);
    assert_eq!(orchestrator.pipeline().camera().deinit_count(), 1);
}

#[tokio::test]
async fn test_invalid_firmware_setting_is_rejected() {
    let mut settings = settings("bad-version");
    settings.device.firmware_version = "one".to_string();

    assert!(build(&settings).await.is_err());
}
