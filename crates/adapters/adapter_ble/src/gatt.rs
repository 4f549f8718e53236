//! GATT transport over one btleplug peripheral.
//!
//! btleplug delivers the notifications of every subscribed characteristic
//! on a single stream. [`Demux`] forwards each frame to the queue of the
//! characteristic it came from, preserving arrival order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, ValueNotification, WriteType};
use btleplug::platform::Peripheral;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt as _};
use uuid::Uuid;

use cubelink_app::ports::{SubChannel, Transport};
use cubelink_domain::channel::SERVICE_UUID;
use cubelink_domain::error::TransportError;
use cubelink_domain::id::CubeId;

use crate::error::BleError;

/// Per-characteristic notification queues fed by one forwarding task.
struct Demux {
    routes: Mutex<HashMap<Uuid, mpsc::Sender<Vec<u8>>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    buffer: usize,
}

impl Demux {
    fn new(buffer: usize) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            task: tokio::sync::Mutex::new(None),
            buffer: buffer.max(1),
        }
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<Vec<u8>>>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, uuid: Uuid) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.routes().insert(uuid, tx);
        rx
    }

    /// Start forwarding the peripheral's notification stream, once.
    async fn ensure_started(self: &Arc<Self>, peripheral: &Peripheral) -> Result<(), BleError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        let stream = peripheral.notifications().await?;
        *task = Some(tokio::spawn(forward(stream, Arc::clone(self))));
        Ok(())
    }

    async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        self.routes().clear();
    }
}

async fn forward<S>(mut stream: S, demux: Arc<Demux>)
where
    S: Stream<Item = ValueNotification> + Unpin,
{
    while let Some(notification) = stream.next().await {
        let route = demux.routes().get(&notification.uuid).cloned();
        let Some(route) = route else {
            tracing::trace!(uuid = %notification.uuid, "notification without subscriber");
            continue;
        };
        if route.send(notification.value).await.is_err() {
            demux.routes().remove(&notification.uuid);
        }
    }
    tracing::debug!("notification stream ended");
    // dropping the senders ends every subscriber's stream
    demux.routes().clear();
}

/// Transport bound to one cube peripheral.
pub struct BleTransport {
    peripheral: Peripheral,
    demux: Arc<Demux>,
}

impl BleTransport {
    /// Wrap a peripheral found by [`locate`](crate::locate) or by the
    /// caller's own scan.
    #[must_use]
    pub fn new(peripheral: Peripheral, notification_buffer: usize) -> Self {
        Self {
            peripheral,
            demux: Arc::new(Demux::new(notification_buffer)),
        }
    }
}

impl Transport for BleTransport {
    type Channel = BleChannel;

    fn id(&self) -> CubeId {
        CubeId::new(self.peripheral.address().to_string())
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.peripheral.connect().await.map_err(BleError::from)?;
        tracing::debug!(address = %self.peripheral.address(), "peripheral connected");
        Ok(())
    }

    async fn discover(&self) -> Result<Vec<BleChannel>, TransportError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(BleError::from)?;
        let channels: Vec<BleChannel> = self
            .peripheral
            .characteristics()
            .into_iter()
            .filter(|characteristic| characteristic.service_uuid == SERVICE_UUID)
            .map(|characteristic| BleChannel {
                peripheral: self.peripheral.clone(),
                characteristic,
                demux: Arc::clone(&self.demux),
            })
            .collect();
        if channels.is_empty() {
            return Err(BleError::ServiceNotFound.into());
        }
        Ok(channels)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.demux.stop().await;
        self.peripheral
            .disconnect()
            .await
            .map_err(BleError::from)?;
        tracing::debug!(address = %self.peripheral.address(), "peripheral disconnected");
        Ok(())
    }
}

/// One GATT characteristic of the cube service.
pub struct BleChannel {
    peripheral: Peripheral,
    characteristic: Characteristic,
    demux: Arc<Demux>,
}

fn write_type(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

impl SubChannel for BleChannel {
    fn uuid(&self) -> Uuid {
        self.characteristic.uuid
    }

    async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        self.peripheral
            .write(
                &self.characteristic,
                data,
                write_type(self.characteristic.properties),
            )
            .await
            .map_err(BleError::from)?;
        Ok(())
    }

    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        let value = self
            .peripheral
            .read(&self.characteristic)
            .await
            .map_err(BleError::from)?;
        Ok(value)
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let rx = self.demux.register(self.characteristic.uuid);
        self.demux.ensure_started(&self.peripheral).await?;
        self.peripheral
            .subscribe(&self.characteristic)
            .await
            .map_err(BleError::from)?;
        Ok(rx)
    }
}
