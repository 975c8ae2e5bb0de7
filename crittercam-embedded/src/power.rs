use crittercam_api::WakeReason;

use crate::scheduler::SleepDuration;

/// Power management of the board.
///
/// On hardware `deep_sleep` and `reset` do not return; execution restarts
/// from the entry point. Host implementations record the request and return.
pub trait PowerControl {
    fn wake_reason(&self) -> WakeReason;

    fn deep_sleep(&mut self, duration: SleepDuration);

    fn reset(&mut self);
}
