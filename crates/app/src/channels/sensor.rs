//! Sensor handler: motion, magnet and attitude readings.
//!
//! A reading request is answered by the next notification of the same
//! kind. Requests are serialised so at most one waits at a time; a second
//! caller queues until the first has settled.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;
use cubelink_domain::protocol::sensor::{self, MagnetMode, ReadingKind, SensorReading};

use super::{NotificationSink, write};
use crate::event_bus::EventBus;
use crate::pending::PendingSlot;
use crate::ports::SubChannel;

pub(crate) struct SensorHandler<C> {
    channel: C,
    bus: Arc<EventBus>,
    reply_timeout: Duration,
    pending: PendingSlot<ReadingKind, SensorReading>,
    request_lock: tokio::sync::Mutex<()>,
    magnet_mode: Mutex<MagnetMode>,
}

impl<C: SubChannel> SensorHandler<C> {
    pub(crate) fn new(channel: C, bus: Arc<EventBus>, reply_timeout: Duration) -> Self {
        Self {
            channel,
            bus,
            reply_timeout,
            pending: PendingSlot::new(),
            request_lock: tokio::sync::Mutex::new(()),
            magnet_mode: Mutex::new(MagnetMode::default()),
        }
    }

    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }

    pub(crate) fn magnet_mode(&self) -> MagnetMode {
        *self
            .magnet_mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch how magnet frames are decoded.
    pub(crate) fn set_magnet_mode(&self, mode: MagnetMode) {
        *self
            .magnet_mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Ask the cube for a reading without waiting for it. The answer is
    /// still published to listeners.
    pub(crate) async fn notify(&self, kind: ReadingKind) -> Result<(), CubeError> {
        write(&self.channel, sensor::encode_request(kind)).await
    }

    /// Ask the cube for a reading and wait for it.
    pub(crate) async fn request(&self, kind: ReadingKind) -> Result<SensorReading, CubeError> {
        let _turn = self.request_lock.lock().await;
        let (pending, _) = self.pending.replace(kind)?;
        if let Err(err) = write(&self.channel, sensor::encode_request(kind)).await {
            self.pending.abandon(pending);
            return Err(err);
        }
        self.pending
            .wait(pending, self.reply_timeout, Domain::Sensor)
            .await
    }

    pub(crate) fn close(&self) {
        self.pending.close();
    }
}

impl<C: SubChannel> NotificationSink for SensorHandler<C> {
    fn domain(&self) -> Domain {
        Domain::Sensor
    }

    fn on_notification(&self, data: &[u8]) {
        let reading = match sensor::decode(data, self.magnet_mode()) {
            Ok(reading) => reading,
            Err(err) => {
                tracing::debug!(domain = %Domain::Sensor, %err, "dropping frame");
                return;
            }
        };
        for event in reading.into_events() {
            self.bus.publish(event);
        }
        let kind = reading.kind();
        self.pending.settle_if(|wanted| *wanted == kind, reading);
    }

    fn on_closed(&self) {
        self.close();
    }
}
