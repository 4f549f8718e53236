//! Configuration handler: protocol version query and cube settings.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;
use cubelink_domain::event::CubeEvent;
use cubelink_domain::protocol::configuration::{self, ConfigurationReply, NotificationCondition};
use cubelink_domain::protocol::sensor::{AttitudeFormat, MagnetMode};
use cubelink_domain::version::ProtocolVersion;

use super::{NotificationSink, write};
use crate::event_bus::EventBus;
use crate::pending::PendingSlot;
use crate::ports::SubChannel;

pub(crate) struct ConfigurationHandler<C> {
    channel: C,
    bus: Arc<EventBus>,
    reply_timeout: Duration,
    pending: PendingSlot<(), String>,
    request_lock: tokio::sync::Mutex<()>,
    version: OnceLock<ProtocolVersion>,
}

impl<C: SubChannel> ConfigurationHandler<C> {
    pub(crate) fn new(channel: C, bus: Arc<EventBus>, reply_timeout: Duration) -> Self {
        Self {
            channel,
            bus,
            reply_timeout,
            pending: PendingSlot::new(),
            request_lock: tokio::sync::Mutex::new(()),
            version: OnceLock::new(),
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

    /// Ask the cube for its raw protocol version string.
    pub(crate) async fn request_version(&self) -> Result<String, CubeError> {
        let _turn = self.request_lock.lock().await;
        let (pending, _) = self.pending.replace(())?;
        if let Err(err) = write(&self.channel, configuration::encode_version_request()).await {
            self.pending.abandon(pending);
            return Err(err);
        }
        self.pending
            .wait(pending, self.reply_timeout, Domain::Configuration)
            .await
    }

    pub(crate) async fn set_flat_threshold(&self, degree: u8) -> Result<(), CubeError> {
        write(&self.channel, configuration::encode_flat_threshold(degree)?).await
    }

    pub(crate) async fn set_collision_threshold(&self, level: u8) -> Result<(), CubeError> {
        write(
            &self.channel,
            configuration::encode_collision_threshold(level)?,
        )
        .await
    }

    pub(crate) async fn set_double_tap_interval(&self, level: u8) -> Result<(), CubeError> {
        write(
            &self.channel,
            configuration::encode_double_tap_interval(level)?,
        )
        .await
    }

    pub(crate) async fn set_id_notification(
        &self,
        interval_ms: u16,
        condition: NotificationCondition,
    ) -> Result<(), CubeError> {
        let command =
            configuration::encode_id_notification(&self.version(), interval_ms, condition)?;
        write(&self.channel, command).await
    }

    pub(crate) async fn set_id_missed_notification(
        &self,
        sensitivity_ms: u16,
    ) -> Result<(), CubeError> {
        let command =
            configuration::encode_id_missed_notification(&self.version(), sensitivity_ms)?;
        write(&self.channel, command).await
    }

    pub(crate) async fn set_magnet_detection(
        &self,
        mode: MagnetMode,
        interval_ms: u16,
        condition: NotificationCondition,
    ) -> Result<(), CubeError> {
        let command =
            configuration::encode_magnet_detection(&self.version(), mode, interval_ms, condition)?;
        write(&self.channel, command).await
    }

    pub(crate) async fn set_motor_speed_feedback(&self, enabled: bool) -> Result<(), CubeError> {
        let command = configuration::encode_motor_speed_feedback(&self.version(), enabled)?;
        write(&self.channel, command).await
    }

    pub(crate) async fn set_attitude_control(
        &self,
        format: AttitudeFormat,
        interval_ms: u16,
        condition: NotificationCondition,
    ) -> Result<(), CubeError> {
        let command = configuration::encode_attitude_control(
            &self.version(),
            format,
            interval_ms,
            condition,
        )?;
        write(&self.channel, command).await
    }

    pub(crate) fn close(&self) {
        self.pending.close();
    }
}

impl<C: SubChannel> NotificationSink for ConfigurationHandler<C> {
    fn domain(&self) -> Domain {
        Domain::Configuration
    }

    fn on_notification(&self, data: &[u8]) {
        match configuration::decode(data) {
            Ok(ConfigurationReply::Version(raw)) => {
                if !self.pending.settle_if(|()| true, raw) {
                    tracing::debug!(domain = %Domain::Configuration, "unsolicited version reply");
                }
            }
            Ok(ConfigurationReply::Response(response)) => {
                self.bus.publish(CubeEvent::ConfigurationResponse(response));
            }
            Err(err) => {
                tracing::debug!(domain = %Domain::Configuration, %err, "dropping frame");
            }
        }
    }

    fn on_closed(&self) {
        self.close();
    }
}
