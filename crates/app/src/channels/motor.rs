//! Motor handler: wheel commands and correlated target moves.
//!
//! Only target moves wait for a reply. A target move written with
//! `overwrite` supersedes the one in flight, which resolves immediately as
//! [`MoveToOutcome::Overwritten`]. Without `overwrite` the new move is held
//! back until the one in flight has settled.

use std::sync::{Arc, OnceLock};

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;
use cubelink_domain::event::{CubeEvent, MoveToOutcome};
use cubelink_domain::id::{RequestId, RequestIdSequence};
use cubelink_domain::protocol::motor::{self, AccelerationMove, MoveToOptions, MoveToTarget};
use cubelink_domain::version::ProtocolVersion;

use super::{NotificationSink, write};
use crate::config::CubeConfig;
use crate::event_bus::EventBus;
use crate::pending::PendingSlot;
use crate::ports::SubChannel;

pub(crate) struct MotorHandler<C> {
    channel: C,
    bus: Arc<EventBus>,
    config: CubeConfig,
    version: OnceLock<ProtocolVersion>,
    request_ids: RequestIdSequence,
    pending: PendingSlot<RequestId, MoveToOutcome>,
}

impl<C: SubChannel> MotorHandler<C> {
    pub(crate) fn new(channel: C, bus: Arc<EventBus>, config: CubeConfig) -> Self {
        Self {
            channel,
            bus,
            config,
            version: OnceLock::new(),
            request_ids: RequestIdSequence::default(),
            pending: PendingSlot::new(),
        }
    }

    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }

    /// Bind the negotiated version. Later calls are ignored.
    pub(crate) fn init(&self, version: &ProtocolVersion) {
        let _ = self.version.set(version.clone());
    }

    fn version(&self) -> ProtocolVersion {
        self.version
            .get()
            .cloned()
            .unwrap_or(ProtocolVersion::BASELINE)
    }

    pub(crate) async fn move_wheels(
        &self,
        left: i16,
        right: i16,
        duration_ms: u16,
    ) -> Result<(), CubeError> {
        let command = motor::encode_move(&self.version(), left, right, duration_ms)?;
        write(&self.channel, command).await
    }

    pub(crate) async fn stop(&self) -> Result<(), CubeError> {
        write(&self.channel, motor::encode_stop(&self.version())?).await
    }

    pub(crate) async fn acceleration_move(
        &self,
        params: &AccelerationMove,
    ) -> Result<(), CubeError> {
        let command = motor::encode_acceleration_move(&self.version(), params)?;
        write(&self.channel, command).await
    }

    pub(crate) async fn move_to(
        &self,
        targets: &[MoveToTarget],
        options: &MoveToOptions,
    ) -> Result<MoveToOutcome, CubeError> {
        let request_id = self.request_ids.next();
        let command = motor::encode_move_to(&self.version(), request_id, targets, options)?;

        let pending = if options.overwrite {
            let (pending, displaced) = self.pending.replace(request_id)?;
            if let Some(displaced) = displaced {
                tracing::debug!(
                    superseded = %displaced.key,
                    by = %request_id,
                    "target move overwritten"
                );
                displaced.settle(Ok(MoveToOutcome::Overwritten));
            }
            pending
        } else {
            self.pending.register_when_vacant(request_id).await?
        };

        if let Err(err) = write(&self.channel, command).await {
            self.pending.abandon(pending);
            return Err(err);
        }
        self.pending
            .wait(
                pending,
                self.config.move_to_timeout(options.timeout_secs),
                Domain::Motor,
            )
            .await
    }

    pub(crate) fn close(&self) {
        self.pending.close();
    }
}

impl<C: SubChannel> NotificationSink for MotorHandler<C> {
    fn domain(&self) -> Domain {
        Domain::Motor
    }

    fn on_notification(&self, data: &[u8]) {
        let event = match motor::decode(data) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(domain = %Domain::Motor, %err, "dropping frame");
                return;
            }
        };
        if let CubeEvent::MotorCommandResponse(response) = &event {
            self.pending
                .settle_if(|id| *id == response.request_id, response.outcome);
        }
        self.bus.publish(event);
    }

    fn on_closed(&self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubelink_domain::error::ErrorKind;

    use crate::channels::mock::MockChannel;

    const V2_0: ProtocolVersion = ProtocolVersion::new(2, 0, 0);
    const V2_1: ProtocolVersion = ProtocolVersion::new(2, 1, 0);

    fn handler(version: &ProtocolVersion) -> Arc<MotorHandler<MockChannel>> {
        let handler = MotorHandler::new(
            MockChannel::for_domain(Domain::Motor),
            Arc::new(EventBus::new(16)),
            CubeConfig::default(),
        );
        handler.init(version);
        Arc::new(handler)
    }

    async fn wait_for_writes(handler: &MotorHandler<MockChannel>, count: usize) {
        while handler.channel.written().len() < count {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_move_to(
        handler: &Arc<MotorHandler<MockChannel>>,
        overwrite: bool,
    ) -> tokio::task::JoinHandle<Result<MoveToOutcome, CubeError>> {
        let handler = Arc::clone(handler);
        tokio::spawn(async move {
            let options = MoveToOptions {
                overwrite,
                ..MoveToOptions::default()
            };
            handler
                .move_to(&[MoveToTarget::point(100, 100)], &options)
                .await
        })
    }

    #[tokio::test]
    async fn should_write_layout_specific_move() {
        let old = handler(&V2_0);
        old.move_wheels(50, 40, 0).await.unwrap();
        let new = handler(&V2_1);
        new.move_wheels(50, 40, 0).await.unwrap();

        assert_eq!(
            old.channel.written(),
            vec![vec![0x02, 0x01, 0x01, 0x32, 0x02, 0x01, 0x28, 0x00]]
        );
        assert_eq!(
            new.channel.written(),
            vec![vec![0x01, 0x01, 0x01, 0x32, 0x02, 0x01, 0x28]]
        );
    }

    #[tokio::test]
    async fn should_resolve_move_to_with_device_outcome() {
        let handler = handler(&V2_1);
        let task = spawn_move_to(&handler, true);
        wait_for_writes(&handler, 1).await;

        let request_id = handler.channel.written()[0][1];
        handler.on_notification(&[0x83, request_id, 0x00]);

        assert_eq!(task.await.unwrap().unwrap(), MoveToOutcome::Success);
    }

    #[tokio::test]
    async fn should_ignore_response_for_other_request() {
        let handler = handler(&V2_1);
        let task = spawn_move_to(&handler, true);
        wait_for_writes(&handler, 1).await;

        let request_id = handler.channel.written()[0][1];
        handler.on_notification(&[0x83, request_id.wrapping_add(1), 0x00]);
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        handler.on_notification(&[0x83, request_id, 0x02]);
        assert_eq!(task.await.unwrap().unwrap(), MoveToOutcome::IdMissed);
    }

    #[tokio::test]
    async fn should_resolve_superseded_move_to_as_overwritten() {
        let handler = handler(&V2_1);
        let first = spawn_move_to(&handler, true);
        wait_for_writes(&handler, 1).await;
        let second = spawn_move_to(&handler, true);
        wait_for_writes(&handler, 2).await;

        assert_eq!(first.await.unwrap().unwrap(), MoveToOutcome::Overwritten);

        let written = handler.channel.written();
        assert_eq!(written[1][7], 0x00);
        handler.on_notification(&[0x83, written[1][1], 0x00]);
        assert_eq!(second.await.unwrap().unwrap(), MoveToOutcome::Success);
    }

    #[tokio::test]
    async fn should_hold_back_append_until_previous_settles() {
        let handler = handler(&V2_1);
        let first = spawn_move_to(&handler, true);
        wait_for_writes(&handler, 1).await;
        let second = spawn_move_to(&handler, false);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(handler.channel.written().len(), 1);

        let first_id = handler.channel.written()[0][1];
        handler.on_notification(&[0x83, first_id, 0x00]);
        assert_eq!(first.await.unwrap().unwrap(), MoveToOutcome::Success);

        wait_for_writes(&handler, 2).await;
        let written = handler.channel.written();
        assert_eq!(written[1][7], 0x01);
        handler.on_notification(&[0x83, written[1][1], 0x00]);
        assert_eq!(second.await.unwrap().unwrap(), MoveToOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_move_to_after_device_timeout_plus_reply_timeout() {
        let handler = handler(&V2_1);
        let options = MoveToOptions {
            timeout_secs: 1,
            ..MoveToOptions::default()
        };
        let start = tokio::time::Instant::now();
        let err = handler
            .move_to(&[MoveToTarget::point(1, 1)], &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CubeError::ReplyTimeout {
                domain: Domain::Motor
            }
        ));
        assert!(start.elapsed() >= std::time::Duration::from_secs(3));
    }

    #[tokio::test]
    async fn should_reject_move_to_on_2_0_without_writing() {
        let handler = handler(&V2_0);
        let err = handler
            .move_to(&[MoveToTarget::point(1, 1)], &MoveToOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(handler.channel.written().is_empty());
    }

    #[tokio::test]
    async fn should_publish_speed_feedback_and_drop_garbage() {
        let handler = handler(&V2_1);
        let mut rx = handler.bus.subscribe();
        handler.on_notification(&[0xe0, 0x10, 0x20]);
        handler.on_notification(&[0xe0]);
        handler.on_notification(&[0x42]);
        assert_eq!(
            rx.try_recv().unwrap().name(),
            cubelink_domain::event::EventName::MotorSpeed
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_settle_move_to_on_close() {
        let handler = handler(&V2_1);
        let task = spawn_move_to(&handler, true);
        wait_for_writes(&handler, 1).await;
        handler.on_closed();
        assert_eq!(
            task.await.unwrap().unwrap_err().kind(),
            ErrorKind::ConnectionClosed
        );
    }
}
