//! Transport port: the wireless collaborator the cube talks through.
//!
//! A transport connects to one peripheral, lists the characteristics of
//! the cube service as [`SubChannel`]s and tears the link down again. It
//! knows nothing about frame layouts; every byte it moves is produced or
//! consumed by the domain codecs.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use cubelink_domain::error::TransportError;
use cubelink_domain::id::CubeId;

/// One characteristic of the cube service.
pub trait SubChannel: Send + Sync + 'static {
    /// Characteristic UUID, resolved to a domain by the router.
    fn uuid(&self) -> uuid::Uuid;

    /// Write a complete frame.
    fn write(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read the current value of the characteristic.
    fn read(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Enable notifications and return the stream of received frames.
    ///
    /// Frames must be delivered in arrival order. The stream ends when the
    /// link is lost.
    fn subscribe(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<Vec<u8>>, TransportError>> + Send;
}

impl<S: SubChannel> SubChannel for Arc<S> {
    fn uuid(&self) -> uuid::Uuid {
        (**self).uuid()
    }

    fn write(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).write(data)
    }

    fn read(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        (**self).read()
    }

    fn subscribe(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<Vec<u8>>, TransportError>> + Send {
        (**self).subscribe()
    }
}

/// Link to one cube.
pub trait Transport: Send + Sync {
    /// Concrete sub-channel handed out by [`discover`](Self::discover).
    type Channel: SubChannel;

    /// Stable identity of the peripheral.
    fn id(&self) -> CubeId;

    /// Establish the link.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// List the characteristics of the cube service.
    fn discover(&self) -> impl Future<Output = Result<Vec<Self::Channel>, TransportError>> + Send;

    /// Tear the link down.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
