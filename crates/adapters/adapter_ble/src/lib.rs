//! # cubelink-adapter-ble
//!
//! BLE adapter: connects to a robot cube through the host's Bluetooth
//! stack (btleplug) and implements the transport port.
//!
//! ## How it works
//!
//! [`locate`] scans for a peripheral advertising the cube service
//! (`10b20100-5b3b-4571-9508-cf3efcd7bbae`) and wraps it in a
//! [`BleTransport`]. Discovery lists the characteristics of that service;
//! each becomes a [`BleChannel`]. Notifications of all subscribed
//! characteristics arrive on one btleplug stream and are demultiplexed by
//! characteristic UUID.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `cubelink-app` and `cubelink-domain`.

mod config;
mod error;
mod gatt;
mod scanner;

pub use config::BleConfig;
pub use error::BleError;
pub use gatt::{BleChannel, BleTransport};
pub use scanner::locate;
