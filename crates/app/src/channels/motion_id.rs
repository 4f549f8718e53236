//! ID handler: position and standard ID notifications.

use std::sync::Arc;

use cubelink_domain::channel::Domain;
use cubelink_domain::protocol::motion_id;

use super::NotificationSink;
use crate::event_bus::EventBus;
use crate::ports::SubChannel;

pub(crate) struct MotionIdHandler<C> {
    channel: C,
    bus: Arc<EventBus>,
}

impl<C: SubChannel> MotionIdHandler<C> {
    pub(crate) fn new(channel: C, bus: Arc<EventBus>) -> Self {
        Self { channel, bus }
    }

    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: SubChannel> NotificationSink for MotionIdHandler<C> {
    fn domain(&self) -> Domain {
        Domain::MotionId
    }

    fn on_notification(&self, data: &[u8]) {
        match motion_id::decode(data) {
            Ok(event) => self.bus.publish(event),
            Err(err) => tracing::debug!(domain = %Domain::MotionId, %err, "dropping frame"),
        }
    }

    fn on_closed(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubelink_domain::event::{CubeEvent, EventName};

    use crate::channels::mock::MockChannel;

    #[test]
    fn should_publish_decoded_position() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let handler = MotionIdHandler::new(MockChannel::for_domain(Domain::MotionId), bus);

        handler.on_notification(&[0x01, 0x0a, 0x00, 0x14, 0x00, 0x1e, 0x00, 0, 0, 0, 0, 0, 0]);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name(), EventName::PositionSampled);
    }

    #[test]
    fn should_drop_malformed_frame_without_publishing() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let handler = MotionIdHandler::new(MockChannel::for_domain(Domain::MotionId), bus);

        handler.on_notification(&[0x01, 0x0a]);
        handler.on_notification(&[]);
        handler.on_notification(&[0x03]);

        assert_eq!(rx.try_recv().unwrap(), CubeEvent::PositionLost);
        assert!(rx.try_recv().is_err());
    }
}
