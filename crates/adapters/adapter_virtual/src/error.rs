//! Errors raised by the virtual cube.

use uuid::Uuid;

/// Failure of a virtual transport operation.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    /// The cube was configured to refuse connections.
    #[error("virtual cube refused the connection")]
    ConnectRefused,

    /// The operation needs an established link.
    #[error("virtual cube is not connected")]
    NotConnected,

    /// The characteristic does not support reads.
    #[error("characteristic {0} is not readable")]
    NotReadable(Uuid),

    /// Nobody subscribed to the characteristic's notifications.
    #[error("no subscriber on characteristic {0}")]
    NotSubscribed(Uuid),
}
