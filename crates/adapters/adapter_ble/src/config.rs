//! BLE transport configuration.

use serde::Deserialize;

/// How to find and talk to a cube over BLE.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Peripheral address to connect to (e.g. `"D1:2A:3B:4C:5D:6E"`).
    ///
    /// When unset, the first cube advertising the cube service is used.
    pub address: Option<String>,
    /// How long to scan for the cube before giving up, in seconds.
    pub locate_timeout_secs: u16,
    /// Notification frames buffered per characteristic.
    pub notification_buffer: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            address: None,
            locate_timeout_secs: 10,
            notification_buffer: 64,
        }
    }
}
