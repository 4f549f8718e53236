//! Button handler: press notifications and on-demand reads.

use std::sync::Arc;
use std::time::Duration;

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;
use cubelink_domain::protocol::button;

use super::{NotificationSink, read};
use crate::event_bus::EventBus;
use crate::pending::Shutdown;
use crate::ports::SubChannel;

pub(crate) struct ButtonHandler<C> {
    channel: C,
    bus: Arc<EventBus>,
    reply_timeout: Duration,
    shutdown: Shutdown,
}

impl<C: SubChannel> ButtonHandler<C> {
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

    /// Read the current button state.
    pub(crate) async fn pressed(&self) -> Result<bool, CubeError> {
        let data = read(&self.channel, Domain::Button, self.reply_timeout, &self.shutdown).await?;
        button::decode_pressed(&data).map_err(CubeError::transport)
    }

    pub(crate) fn close(&self) {
        self.shutdown.close();
    }
}

impl<C: SubChannel> NotificationSink for ButtonHandler<C> {
    fn domain(&self) -> Domain {
        Domain::Button
    }

    fn on_notification(&self, data: &[u8]) {
        match button::decode(data) {
            Ok(event) => self.bus.publish(event),
            Err(err) => tracing::debug!(domain = %Domain::Button, %err, "dropping frame"),
        }
    }

    fn on_closed(&self) {
        self.close();
    }
}
