//! Scanner: finds a cube advertising the cube service.

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio_stream::StreamExt as _;

use cubelink_domain::channel::SERVICE_UUID;

use crate::config::BleConfig;
use crate::error::BleError;
use crate::gatt::BleTransport;

/// Whether `address` passes the optional address filter.
pub(crate) fn matches_address(filter: Option<&str>, address: &str) -> bool {
    filter.is_none_or(|wanted| wanted.eq_ignore_ascii_case(address))
}

/// Scan for a cube and return a transport bound to it.
///
/// The first peripheral advertising the cube service that passes
/// [`BleConfig::address`] wins.
///
/// # Errors
///
/// Returns [`BleError::NotAvailable`] without a BLE adapter,
/// [`BleError::NotFound`] when no cube shows up within
/// [`BleConfig::locate_timeout_secs`], or [`BleError::Bluetooth`] when the
/// scan cannot be started.
pub async fn locate(config: &BleConfig) -> Result<BleTransport, BleError> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(BleError::NotAvailable)?;

    let timeout = Duration::from_secs(u64::from(config.locate_timeout_secs));
    tracing::info!(
        address = ?config.address,
        timeout_secs = config.locate_timeout_secs,
        "scanning for cube"
    );

    central
        .start_scan(ScanFilter {
            services: vec![SERVICE_UUID],
        })
        .await?;
    let found = scan(&central, config.address.as_deref(), timeout).await;
    if let Err(err) = central.stop_scan().await {
        tracing::warn!(%err, "failed to stop BLE scan");
    }

    match found? {
        Some(peripheral) => {
            tracing::info!(address = %peripheral.address(), "cube found");
            Ok(BleTransport::new(peripheral, config.notification_buffer))
        }
        None => Err(BleError::NotFound {
            address: config.address.clone(),
        }),
    }
}

async fn scan(
    central: &Adapter,
    filter: Option<&str>,
    timeout: Duration,
) -> Result<Option<Peripheral>, BleError> {
    let mut events = central.events().await?;
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(CentralEvent::DeviceDiscovered(id))) => {
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                let address = peripheral.address().to_string();
                if matches_address(filter, &address) {
                    return Ok(Some(peripheral));
                }
                tracing::debug!(%address, "skipping cube filtered out by address");
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return Ok(None),
        }
    }
}
