mod credentials;
mod device_state;
mod memory;

pub use credentials::*;
pub use device_state::*;
pub use memory::*;

use alloc::string::String;

/// Key holding the saved network profiles.
pub const CREDENTIALS_KEY: &str = "wifi.dat";
/// Key holding the JSON device-state record.
pub const DEVICE_STATE_KEY: &str = "device_state.json";

#[allow(async_fn_in_trait)]
pub trait LocalStorage {
    type Error: core::fmt::Debug;

    async fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error>;

    async fn set_item(&mut self, key: &str, value: &str) -> Result<(), Self::Error>;

    async fn remove_item(&mut self, key: &str) -> Result<(), Self::Error>;

    async fn clear(&mut self) -> Result<(), Self::Error>;
}
