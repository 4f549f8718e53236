//! Battery handler: level notifications and on-demand reads.

use std::sync::Arc;
use std::time::Duration;

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;
use cubelink_domain::protocol::battery;

use super::{NotificationSink, read};
use crate::event_bus::EventBus;
use crate::pending::Shutdown;
use crate::ports::SubChannel;

pub(crate) struct BatteryHandler<C> {
    channel: C,
    bus: Arc<EventBus>,
    reply_timeout: Duration,
    shutdown: Shutdown,
}

impl<C: SubChannel> BatteryHandler<C> {
    pub(crate) fn new(channel: C, bus: Arc<EventBus>, reply_timeout: Duration) -> Self {
        Self {
            channel,
            bus,
            reply_timeout,
            shutdown: Shutdown::new(),
        }
    }

    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }

    /// Read the battery level in percent.
    pub(crate) async fn level(&self) -> Result<u8, CubeError> {
        let data = read(&self.channel, Domain::Battery, self.reply_timeout, &self.shutdown).await?;
        battery::decode_level(&data).map_err(CubeError::transport)
    }

    pub(crate) fn close(&self) {
        self.shutdown.close();
    }
}

impl<C: SubChannel> NotificationSink for BatteryHandler<C> {
    fn domain(&self) -> Domain {
        Domain::Battery
    }

    fn on_notification(&self, data: &[u8]) {
        match battery::decode(data) {
            Ok(event) => self.bus.publish(event),
            Err(err) => tracing::debug!(domain = %Domain::Battery, %err, "dropping frame"),
        }
    }

    fn on_closed(&self) {
        self.close();
    }
}
