//! BLE adapter error types.

use cubelink_domain::error::CubeError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// The radio stack rejected an operation.
    #[error("BLE error")]
    Bluetooth(#[from] btleplug::Error),

    /// No cube answered the scan before the deadline.
    #[error("no cube found{}", .address.as_deref().map(|a| format!(" at {a}")).unwrap_or_default())]
    NotFound {
        /// Address that was looked for, if any.
        address: Option<String>,
    },

    /// The peripheral does not expose the cube service.
    #[error("peripheral does not expose the cube service")]
    ServiceNotFound,
}

impl From<BleError> for CubeError {
    fn from(err: BleError) -> Self {
        CubeError::transport(err)
    }
}
