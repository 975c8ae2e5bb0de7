mod manager;
mod portal;

pub use manager::*;
pub use portal::*;

use core::fmt::Debug;
use core::net::Ipv4Addr;

use alloc::string::String;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEncryption {
    None,
    WEP,
    WPA,
    WPA2,
    WPA3,
}

/// A network seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    /// Signal strength in dBm
    pub rssi: i8,
    pub encryption: WifiEncryption,
}

#[allow(async_fn_in_trait)]
pub trait WifiController {
    type Error: Debug;

    /// Start access point mode with given SSID
    async fn start_ap(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Stop access point mode
    async fn stop_ap(&mut self) -> Result<(), Self::Error>;

    /// List networks currently in range
    async fn scan(&mut self) -> Result<Vec<AccessPoint>, Self::Error>;

    /// Start joining a network; completion is observed through `is_connected`
    async fn connect_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Disconnect from current WiFi network
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Check if currently connected to a WiFi network
    fn is_connected(&self) -> bool;

    /// RSSI of the current link in dBm
    fn signal_strength(&self) -> Option<i8>;
}

/// DNS redirect plus HTTP listener on the access point interface.
#[allow(async_fn_in_trait)]
pub trait PortalServer {
    type Error: Debug;

    /// Answer every DNS query with `address` and start accepting HTTP clients on it.
    async fn start(&mut self, address: Ipv4Addr) -> Result<(), Self::Error>;

    async fn stop(&mut self) -> Result<(), Self::Error>;

    /// Wait for the next client and read its request into `buffer`.
    async fn next_request(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read more of the current request, for clients that send the body separately.
    async fn read_more(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Send a response and close the current client.
    async fn respond(&mut self, response: &[u8]) -> Result<(), Self::Error>;
}
