use core::ops::{Deref, DerefMut};

use alloc::string::String;
use alloc::vec::Vec;

use crittercam_api::WeatherCondition;
use embassy_time::{Duration, Timer, with_timeout};

use crate::Error;
use crate::coordinator::ImageUploader;

use super::{CameraDriver, CameraSettings};

/// Sensor settle time between power-up and the first usable frame.
pub const STABILIZE_DELAY: Duration = Duration::from_millis(1200);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Success { size: usize },
    EmptyArtifact,
    PeripheralError(String),
    UploadError(String),
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Success { .. })
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            CaptureOutcome::Success { .. } => None,
            CaptureOutcome::EmptyArtifact => Some("camera: captured frame was empty".into()),
            CaptureOutcome::PeripheralError(detail) => Some(alloc::format!("camera: {}", detail)),
            CaptureOutcome::UploadError(detail) => Some(alloc::format!("upload: {}", detail)),
        }
    }

    /// Where in the taxonomy a failed outcome belongs.
    pub fn error(&self) -> Option<Error> {
        match self {
            CaptureOutcome::Success { .. } => None,
            CaptureOutcome::EmptyArtifact | CaptureOutcome::PeripheralError(_) => Some(Error::PeripheralFailure),
            CaptureOutcome::UploadError(_) => Some(Error::UploadFailure),
        }
    }
}

/// Keeps the camera powered for as long as it is alive.
///
/// Dropping it always deinitializes the sensor, whether the capture
/// returned, failed, was cancelled or unwound.
struct PoweredCamera<'a, C: CameraDriver> {
    camera: &'a mut C,
}

impl<'a, C: CameraDriver> PoweredCamera<'a, C> {
    fn new(camera: &'a mut C) -> Self {
        Self { camera }
    }
}

impl<C: CameraDriver> Deref for PoweredCamera<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.camera
    }
}

impl<C: CameraDriver> DerefMut for PoweredCamera<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.camera
    }
}

impl<C: CameraDriver> Drop for PoweredCamera<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.camera.deinit() {
            log::warn!("Camera deinit failed: {:?}", e);
        }
    }
}

pub struct CaptureUploadPipeline<C: CameraDriver> {
    camera: C,
    stabilize_delay: Duration,
    upload_timeout: Duration,
}

impl<C: CameraDriver> CaptureUploadPipeline<C> {
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            stabilize_delay: STABILIZE_DELAY,
            upload_timeout: UPLOAD_TIMEOUT,
        }
    }

    pub fn with_stabilize_delay(mut self, delay: Duration) -> Self {
        self.stabilize_delay = delay;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub async fn capture_and_upload<U: ImageUploader>(
        &mut self,
        uploader: &mut U,
        weather: WeatherCondition,
        is_test_upload: bool,
    ) -> bool {
        self.run(uploader, weather, is_test_upload).await.is_success()
    }

    /// Captures one frame tuned for `weather` and uploads it.
    ///
    /// The camera is released before the upload starts.
    pub async fn run<U: ImageUploader>(
        &mut self,
        uploader: &mut U,
        weather: WeatherCondition,
        is_test_upload: bool,
    ) -> CaptureOutcome {
        let frame = match self.capture_frame(weather).await {
            Ok(frame) => frame,
            Err(outcome) => {
                log::error!("{}: {:?}", Error::PeripheralFailure, outcome);
                return outcome;
            }
        };

        if frame.is_empty() {
            log::warn!("{}: empty frame, skipping upload", Error::PeripheralFailure);
            return CaptureOutcome::EmptyArtifact;
        }

        log::info!(
            "Uploading {} byte image{}",
            frame.len(),
            if is_test_upload { " (test)" } else { "" }
        );

        match with_timeout(self.upload_timeout, uploader.upload_image(&frame, is_test_upload)).await {
            Ok(Ok(())) => {
                log::info!("Image uploaded");
                CaptureOutcome::Success { size: frame.len() }
            }
            Ok(Err(e)) => {
                log::error!("{}: {:?}", Error::UploadFailure, e);
                CaptureOutcome::UploadError(alloc::format!("{:?}", e))
            }
            Err(_) => {
                log::error!("{}: {}", Error::UploadFailure, Error::TimeoutError);
                CaptureOutcome::UploadError(alloc::format!(
                    "timed out after {} ms",
                    self.upload_timeout.as_millis()
                ))
            }
        }
    }

    async fn capture_frame(&mut self, weather: WeatherCondition) -> Result<Vec<u8>, CaptureOutcome> {
        let peripheral = |stage: &'static str| {
            move |e: C::Error| CaptureOutcome::PeripheralError(alloc::format!("{}: {:?}", stage, e))
        };

        let mut camera = PoweredCamera::new(&mut self.camera);
        camera.init().map_err(peripheral("init"))?;

        Timer::after(self.stabilize_delay).await;

        let settings = CameraSettings::for_weather(weather);
        log::debug!("Camera settings: {:?}", settings);
        camera.configure(&settings).map_err(peripheral("configure"))?;

        camera.capture().map_err(peripheral("capture"))
    }
}
