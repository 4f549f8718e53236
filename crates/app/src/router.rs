//! Channel router: binds discovered sub-channels to their handlers.

use std::sync::Arc;

use tokio::task::JoinHandle;

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;
use cubelink_domain::version::ProtocolVersion;

use crate::channels::battery::BatteryHandler;
use crate::channels::button::ButtonHandler;
use crate::channels::configuration::ConfigurationHandler;
use crate::channels::light::LightHandler;
use crate::channels::motion_id::MotionIdHandler;
use crate::channels::motor::MotorHandler;
use crate::channels::sensor::SensorHandler;
use crate::channels::sound::SoundHandler;
use crate::channels::{LinkStatus, spawn_pump};
use crate::config::CubeConfig;
use crate::event_bus::EventBus;
use crate::ports::SubChannel;

/// One optional handler slot per domain.
///
/// A slot stays empty when the cube did not expose the matching
/// sub-channel; every operation on an empty slot fails with
/// [`CubeError::CapabilityUnavailable`].
pub struct ChannelSet<C> {
    motion_id: Option<Arc<MotionIdHandler<C>>>,
    motor: Option<Arc<MotorHandler<C>>>,
    light: Option<Arc<LightHandler<C>>>,
    sound: Option<Arc<SoundHandler<C>>>,
    sensor: Option<Arc<SensorHandler<C>>>,
    button: Option<Arc<ButtonHandler<C>>>,
    battery: Option<Arc<BatteryHandler<C>>>,
    configuration: Option<Arc<ConfigurationHandler<C>>>,
    link: Arc<LinkStatus>,
}

impl<C> Default for ChannelSet<C> {
    fn default() -> Self {
        Self {
            motion_id: None,
            motor: None,
            light: None,
            sound: None,
            sensor: None,
            button: None,
            battery: None,
            configuration: None,
            link: Arc::new(LinkStatus::default()),
        }
    }
}

fn capability<T>(slot: Option<&Arc<T>>) -> Result<&Arc<T>, CubeError> {
    slot.ok_or(CubeError::CapabilityUnavailable)
}

impl<C: SubChannel> ChannelSet<C> {
    /// Bind every sub-channel whose UUID belongs to the cube service.
    ///
    /// Unknown UUIDs are ignored, as is a second sub-channel for a domain
    /// that is already bound.
    pub(crate) fn route(channels: Vec<C>, bus: &Arc<EventBus>, config: &CubeConfig) -> Self {
        let mut set = Self::default();
        let timeout = config.reply_timeout();
        for channel in channels {
            let uuid = channel.uuid();
            let Some(domain) = Domain::from_uuid(uuid) else {
                tracing::debug!(%uuid, "ignoring unknown characteristic");
                continue;
            };
            if set.has(domain) {
                tracing::debug!(%uuid, %domain, "ignoring duplicate characteristic");
                continue;
            }
            let bus = Arc::clone(bus);
            match domain {
                Domain::MotionId => {
                    set.motion_id = Some(Arc::new(MotionIdHandler::new(channel, bus)));
                }
                Domain::Motor => {
                    set.motor = Some(Arc::new(MotorHandler::new(channel, bus, *config)));
                }
                Domain::Light => set.light = Some(Arc::new(LightHandler::new(channel))),
                Domain::Sound => set.sound = Some(Arc::new(SoundHandler::new(channel))),
                Domain::Sensor => {
                    set.sensor = Some(Arc::new(SensorHandler::new(channel, bus, timeout)));
                }
                Domain::Button => {
                    set.button = Some(Arc::new(ButtonHandler::new(channel, bus, timeout)));
                }
                Domain::Battery => {
                    set.battery = Some(Arc::new(BatteryHandler::new(channel, bus, timeout)));
                }
                Domain::Configuration => {
                    set.configuration =
                        Some(Arc::new(ConfigurationHandler::new(channel, bus, timeout)));
                }
            }
            tracing::debug!(%domain, "bound sub-channel");
        }
        set
    }

    /// Subscribe every notifying sub-channel and start its pump.
    ///
    /// # Errors
    ///
    /// Returns the first subscription failure; pumps started before it are
    /// aborted.
    pub(crate) async fn start_pumps(&self) -> Result<Vec<JoinHandle<()>>, CubeError> {
        let mut pumps = Vec::new();
        let result = self.start_pumps_into(&mut pumps).await;
        if let Err(err) = result {
            for pump in pumps {
                pump.abort();
            }
            return Err(err);
        }
        Ok(pumps)
    }

    async fn start_pumps_into(&self, pumps: &mut Vec<JoinHandle<()>>) -> Result<(), CubeError> {
        if let Some(h) = &self.motion_id {
            pumps.push(spawn_pump(h.channel(), Arc::clone(h), Arc::clone(&self.link)).await?);
        }
        if let Some(h) = &self.motor {
            pumps.push(spawn_pump(h.channel(), Arc::clone(h), Arc::clone(&self.link)).await?);
        }
        if let Some(h) = &self.sensor {
            pumps.push(spawn_pump(h.channel(), Arc::clone(h), Arc::clone(&self.link)).await?);
        }
        if let Some(h) = &self.button {
            pumps.push(spawn_pump(h.channel(), Arc::clone(h), Arc::clone(&self.link)).await?);
        }
        if let Some(h) = &self.battery {
            pumps.push(spawn_pump(h.channel(), Arc::clone(h), Arc::clone(&self.link)).await?);
        }
        if let Some(h) = &self.configuration {
            pumps.push(spawn_pump(h.channel(), Arc::clone(h), Arc::clone(&self.link)).await?);
        }
        Ok(())
    }

    /// Hand the negotiated version to the version-sensitive handlers.
    pub(crate) fn init(&self, version: &ProtocolVersion) {
        if let Some(motor) = &self.motor {
            motor.init(version);
        }
        if let Some(configuration) = &self.configuration {
            configuration.init(version);
        }
    }

    /// Settle every pending request with [`CubeError::ConnectionClosed`].
    pub(crate) fn close(&self) {
        if let Some(motor) = &self.motor {
            motor.close();
        }
        if let Some(sensor) = &self.sensor {
            sensor.close();
        }
        if let Some(button) = &self.button {
            button.close();
        }
        if let Some(battery) = &self.battery {
            battery.close();
        }
        if let Some(configuration) = &self.configuration {
            configuration.close();
        }
    }

    /// Whether a notification stream of this set ended underneath it.
    pub(crate) fn link_lost(&self) -> bool {
        self.link.is_lost()
    }

    /// Whether a handler is bound for `domain`.
    #[must_use]
    pub fn has(&self, domain: Domain) -> bool {
        match domain {
            Domain::MotionId => self.motion_id.is_some(),
            Domain::Motor => self.motor.is_some(),
            Domain::Light => self.light.is_some(),
            Domain::Sound => self.sound.is_some(),
            Domain::Sensor => self.sensor.is_some(),
            Domain::Button => self.button.is_some(),
            Domain::Battery => self.battery.is_some(),
            Domain::Configuration => self.configuration.is_some(),
        }
    }

    /// Domains with a bound handler, in table order.
    #[must_use]
    pub fn domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|domain| self.has(*domain))
            .collect()
    }

    pub(crate) fn motor(&self) -> Result<&Arc<MotorHandler<C>>, CubeError> {
        capability(self.motor.as_ref())
    }

    pub(crate) fn light(&self) -> Result<&Arc<LightHandler<C>>, CubeError> {
        capability(self.light.as_ref())
    }

    pub(crate) fn sound(&self) -> Result<&Arc<SoundHandler<C>>, CubeError> {
        capability(self.sound.as_ref())
    }

    pub(crate) fn sensor(&self) -> Result<&Arc<SensorHandler<C>>, CubeError> {
        capability(self.sensor.as_ref())
    }

    pub(crate) fn button(&self) -> Result<&Arc<ButtonHandler<C>>, CubeError> {
        capability(self.button.as_ref())
    }

    pub(crate) fn battery(&self) -> Result<&Arc<BatteryHandler<C>>, CubeError> {
        capability(self.battery.as_ref())
    }

    pub(crate) fn configuration(&self) -> Result<&Arc<ConfigurationHandler<C>>, CubeError> {
        capability(self.configuration.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubelink_domain::error::ErrorKind;

    use crate::channels::mock::MockChannel;

    fn route(channels: Vec<MockChannel>) -> ChannelSet<MockChannel> {
        ChannelSet::route(
            channels,
            &Arc::new(EventBus::new(16)),
            &CubeConfig::default(),
        )
    }

    #[test]
    fn should_bind_known_uuids_and_ignore_unknown_ones() {
        let stranger = MockChannel {
            uuid: uuid::Uuid::from_u128(0x2a19),
            ..MockChannel::default()
        };
        let set = route(vec![
            MockChannel::for_domain(Domain::Motor),
            stranger,
            MockChannel::for_domain(Domain::Battery),
        ]);
        assert_eq!(set.domains(), vec![Domain::Motor, Domain::Battery]);
    }

    #[test]
    fn should_report_missing_domain_as_capability_unavailable() {
        let set = route(vec![MockChannel::for_domain(Domain::Motor)]);
        assert!(set.motor().is_ok());
        assert_eq!(
            set.light().err().map(|e| e.kind()),
            Some(ErrorKind::CapabilityUnavailable)
        );
        assert_eq!(
            set.configuration().err().map(|e| e.kind()),
            Some(ErrorKind::CapabilityUnavailable)
        );
    }

    #[test]
    fn should_keep_first_channel_of_a_duplicated_domain() {
        let set = route(vec![
            MockChannel::for_domain(Domain::Sound),
            MockChannel::for_domain(Domain::Sound),
        ]);
        assert_eq!(set.domains(), vec![Domain::Sound]);
    }

    #[tokio::test]
    async fn should_start_one_pump_per_notifying_channel() {
        let set = route(
            Domain::ALL
                .into_iter()
                .map(MockChannel::for_domain)
                .collect(),
        );
        let pumps = set.start_pumps().await.unwrap();
        // light and sound never notify
        assert_eq!(pumps.len(), 6);
        for pump in pumps {
            pump.abort();
        }
    }
}
