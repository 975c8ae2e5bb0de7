//! Collaborators on the coordinator side of the network link.

use core::fmt::Debug;

use crittercam_api::{DeviceStatus, FirmwareVersion};
use serde_json::Value;

/// Sink for captured images.
#[allow(async_fn_in_trait)]
pub trait ImageUploader {
    type UploadError: Debug;

    /// `test_post` marks images the coordinator should not publish.
    async fn upload_image(&mut self, image: &[u8], test_post: bool) -> Result<(), Self::UploadError>;
}

#[allow(async_fn_in_trait)]
pub trait CoordinatorClient: ImageUploader {
    type Error: Debug;

    /// Returns the raw configuration payload, `None` when there is none.
    async fn fetch_config(&mut self) -> Result<Option<Value>, Self::Error>;

    async fn report_status(&mut self, status: &DeviceStatus) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    /// The new image is staged and takes effect on the next boot.
    Applied(FirmwareVersion),
}

#[allow(async_fn_in_trait)]
pub trait FirmwareUpdater {
    type Error: Debug;

    fn current_version(&self) -> FirmwareVersion;

    async fn check_and_apply(&mut self) -> Result<UpdateOutcome, Self::Error>;
}
