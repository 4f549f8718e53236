//! Device facade: one connected cube and every command it accepts.
//!
//! A [`Cube`] owns its transport, the event bus and the handler set built
//! at connect time. Commands resolve the handler for their domain and fail
//! with [`CubeError::CapabilityUnavailable`] when the cube did not expose
//! the sub-channel, or when it is not connected at all.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use cubelink_domain::channel::Domain;
use cubelink_domain::error::{CubeError, DecodeError};
use cubelink_domain::event::{
    AttitudeEuler, AttitudeQuaternion, CubeEvent, EventName, MagnetForce, MotionStatus,
    MoveToOutcome, Orientation,
};
use cubelink_domain::id::{CubeId, ListenerId};
use cubelink_domain::protocol::configuration::NotificationCondition;
use cubelink_domain::protocol::light::LightOperation;
use cubelink_domain::protocol::motor::{AccelerationMove, MoveToOptions, MoveToTarget};
use cubelink_domain::protocol::sensor::{AttitudeFormat, MagnetMode, ReadingKind, SensorReading};
use cubelink_domain::protocol::sound::SoundOperation;
use cubelink_domain::version::ProtocolVersion;

use crate::config::CubeConfig;
use crate::event_bus::EventBus;
use crate::negotiator;
use crate::ports::Transport;
use crate::router::ChannelSet;

/// Lifecycle of a [`Cube`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handlers and pumps of one live connection.
struct Session<C> {
    channels: Arc<ChannelSet<C>>,
    pumps: Vec<JoinHandle<()>>,
}

impl<C: crate::ports::SubChannel> Session<C> {
    fn shutdown(self) {
        self.channels.close();
        for pump in self.pumps {
            pump.abort();
        }
    }
}

/// Client for one robot cube reached through `T`.
pub struct Cube<T: Transport> {
    transport: T,
    config: CubeConfig,
    bus: Arc<EventBus>,
    channels: RwLock<Arc<ChannelSet<T::Channel>>>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    state: Mutex<ConnectionState>,
    version: Mutex<Option<ProtocolVersion>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl<T: Transport> Cube<T> {
    #[must_use]
    pub fn new(transport: T, config: CubeConfig) -> Self {
        Self {
            transport,
            config,
            bus: Arc::new(EventBus::new(config.event_buffer)),
            channels: RwLock::new(Arc::new(ChannelSet::default())),
            pumps: Mutex::new(Vec::new()),
            state: Mutex::new(ConnectionState::Disconnected),
            version: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Identity reported by the transport.
    #[must_use]
    pub fn id(&self) -> CubeId {
        self.transport.id()
    }

    /// Current lifecycle state. A connection whose link dropped reports
    /// [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.reap_lost_link();
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Protocol version negotiated by the current connection.
    #[must_use]
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.reap_lost_link();
        self.version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Domains whose sub-channel was discovered on the current connection.
    #[must_use]
    pub fn domains(&self) -> Vec<Domain> {
        self.channels().domains()
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn channels(&self) -> Arc<ChannelSet<T::Channel>> {
        self.reap_lost_link();
        Arc::clone(&self.channels.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Drop the installed session once the transport ended its notification
    /// streams. Pending replies were already settled by the pumps.
    fn reap_lost_link(&self) {
        let channels = {
            let mut installed = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            if !installed.link_lost() {
                return;
            }
            std::mem::replace(&mut *installed, Arc::new(ChannelSet::default()))
        };
        self.teardown(channels);
        tracing::warn!(cube = %self.transport.id(), "link lost, cube disconnected");
    }

    fn teardown(&self, channels: Arc<ChannelSet<T::Channel>>) {
        let pumps = std::mem::take(&mut *self.pumps.lock().unwrap_or_else(PoisonError::into_inner));
        Session { channels, pumps }.shutdown();
        *self.version.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn unsupported(&self, feature: &'static str) -> CubeError {
        CubeError::Unsupported {
            feature,
            version: self.version().unwrap_or(ProtocolVersion::BASELINE),
        }
    }

    // lifecycle

    /// Connect, discover the cube's sub-channels and negotiate the protocol
    /// version. Connecting an already connected cube is a no-op; a cube
    /// whose link dropped connects again.
    ///
    /// # Errors
    ///
    /// Transport failures surface as [`CubeError::Transport`]; a cube
    /// without a configuration sub-channel fails with
    /// [`CubeError::CapabilityUnavailable`]. On any error the cube is left
    /// disconnected.
    #[tracing::instrument(skip(self), fields(cube = %self.transport.id()))]
    pub async fn connect(&self) -> Result<(), CubeError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);

        if let Err(err) = self.transport.connect().await {
            self.set_state(ConnectionState::Disconnected);
            tracing::warn!(%err, "transport connect failed");
            return Err(CubeError::Transport(err));
        }

        match self.establish().await {
            Ok((session, version)) => {
                *self.channels.write().unwrap_or_else(PoisonError::into_inner) = session.channels;
                self.pumps
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(session.pumps);
                *self.version.lock().unwrap_or_else(PoisonError::into_inner) = Some(version);
                self.set_state(ConnectionState::Connected);
                tracing::info!(domains = ?self.domains(), "cube connected");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "connect aborted");
                if let Err(err) = self.transport.disconnect().await {
                    tracing::debug!(%err, "transport disconnect after failed connect");
                }
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<(Session<T::Channel>, ProtocolVersion), CubeError> {
        let discovered = self
            .transport
            .discover()
            .await
            .map_err(CubeError::Transport)?;
        let channels = Arc::new(ChannelSet::route(discovered, &self.bus, &self.config));
        channels.configuration()?;
        let pumps = channels.start_pumps().await?;
        let session = Session { channels, pumps };
        match Self::prepare(&session.channels).await {
            Ok(version) => Ok((session, version)),
            Err(err) => {
                session.shutdown();
                Err(err)
            }
        }
    }

    async fn prepare(channels: &ChannelSet<T::Channel>) -> Result<ProtocolVersion, CubeError> {
        let version = negotiator::negotiate(channels.configuration()?.as_ref()).await?;
        channels.init(&version);
        if let Ok(sensor) = channels.sensor() {
            sensor.notify(ReadingKind::Motion).await?;
            sensor.notify(ReadingKind::Magnet).await?;
        }
        Ok(version)
    }

    /// Tear the connection down. Every pending reply settles with
    /// [`CubeError::ConnectionClosed`] before the transport is released.
    ///
    /// # Errors
    ///
    /// Returns [`CubeError::Transport`] when the transport fails to
    /// disconnect; the cube is disconnected regardless.
    #[tracing::instrument(skip(self), fields(cube = %self.transport.id()))]
    pub async fn disconnect(&self) -> Result<(), CubeError> {
        let _lifecycle = self.lifecycle.lock().await;
        self.set_state(ConnectionState::Disconnected);
        let channels = std::mem::replace(
            &mut *self.channels.write().unwrap_or_else(PoisonError::into_inner),
            Arc::new(ChannelSet::default()),
        );
        self.teardown(channels);

        self.transport
            .disconnect()
            .await
            .map_err(CubeError::Transport)?;
        tracing::info!("cube disconnected");
        Ok(())
    }

    // events

    /// Register `listener` for events named `name`.
    pub fn on<F>(&self, name: EventName, listener: F) -> ListenerId
    where
        F: Fn(&CubeEvent) + Send + Sync + 'static,
    {
        self.bus.on(name, listener)
    }

    /// Remove a listener added with [`on`](Self::on).
    pub fn off(&self, name: EventName, id: ListenerId) -> bool {
        self.bus.off(name, id)
    }

    /// Stream of every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CubeEvent> {
        self.bus.subscribe()
    }

    // motor

    /// Drive both wheels. `duration_ms == 0` keeps driving until the next
    /// motor command.
    ///
    /// # Errors
    ///
    /// [`CubeError::OutOfRange`] for a speed outside `[-115, 115]` or a
    /// duration above 2550 ms.
    #[tracing::instrument(skip(self))]
    pub async fn move_wheels(
        &self,
        left: i16,
        right: i16,
        duration_ms: u16,
    ) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.motor()?.move_wheels(left, right, duration_ms).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.motor()?.stop().await
    }

    /// Drive to one or more targets on the mat and wait for the outcome.
    ///
    /// # Errors
    ///
    /// [`CubeError::Unsupported`] before protocol 2.1,
    /// [`CubeError::ReplyTimeout`] when the cube never reports back.
    #[tracing::instrument(skip(self))]
    pub async fn move_to(
        &self,
        targets: &[MoveToTarget],
        options: &MoveToOptions,
    ) -> Result<MoveToOutcome, CubeError> {
        let channels = self.channels();
        channels.motor()?.move_to(targets, options).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn acceleration_move(&self, params: &AccelerationMove) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.motor()?.acceleration_move(params).await
    }

    // light

    #[tracing::instrument(skip(self))]
    pub async fn turn_on_light(&self, operation: &LightOperation) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.light()?.turn_on(operation).await
    }

    /// Play a light sequence; `repeat == 0` loops forever.
    #[tracing::instrument(skip(self))]
    pub async fn turn_on_light_with_scenario(
        &self,
        operations: &[LightOperation],
        repeat: u8,
    ) -> Result<(), CubeError> {
        let channels = self.channels();
        channels
            .light()?
            .turn_on_with_scenario(operations, repeat)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn turn_off_light(&self) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.light()?.turn_off().await
    }

    // sound

    #[tracing::instrument(skip(self))]
    pub async fn play_preset_sound(&self, sound_id: u8) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.sound()?.play_preset(sound_id).await
    }

    /// Play a melody; `repeat == 0` loops forever.
    #[tracing::instrument(skip(self))]
    pub async fn play_sound(
        &self,
        operations: &[SoundOperation],
        repeat: u8,
    ) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.sound()?.play(operations, repeat).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn stop_sound(&self) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.sound()?.stop().await
    }

    // sensor

    async fn motion_status(&self) -> Result<MotionStatus, CubeError> {
        let channels = self.channels();
        match channels.sensor()?.request(ReadingKind::Motion).await? {
            SensorReading::Motion(status) => Ok(status),
            other => Err(unexpected_reading(&other)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_slope_status(&self) -> Result<bool, CubeError> {
        Ok(self.motion_status().await?.is_sloped)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_collision_status(&self) -> Result<bool, CubeError> {
        Ok(self.motion_status().await?.is_collision_detected)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_double_tap_status(&self) -> Result<bool, CubeError> {
        Ok(self.motion_status().await?.is_double_tapped)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_orientation(&self) -> Result<Orientation, CubeError> {
        Ok(self.motion_status().await?.orientation)
    }

    /// Shake level, `0` when the firmware does not report one.
    #[tracing::instrument(skip(self))]
    pub async fn get_shake_status(&self) -> Result<u8, CubeError> {
        Ok(self.motion_status().await?.shake_level)
    }

    /// Id of the magnet placement under the cube, `0` for none.
    #[tracing::instrument(skip(self))]
    pub async fn get_magnet_id(&self) -> Result<u8, CubeError> {
        let channels = self.channels();
        match channels.sensor()?.request(ReadingKind::Magnet).await? {
            SensorReading::MagnetState(id) | SensorReading::MagnetForce(id, _) => Ok(id),
            other => Err(unexpected_reading(&other)),
        }
    }

    /// Magnetic force and direction.
    ///
    /// # Errors
    ///
    /// [`CubeError::Unsupported`] unless magnet detection was switched to
    /// [`MagnetMode::Force`] with [`set_magnet_detection`](Self::set_magnet_detection).
    #[tracing::instrument(skip(self))]
    pub async fn get_magnet_force(&self) -> Result<MagnetForce, CubeError> {
        let channels = self.channels();
        let sensor = channels.sensor()?;
        if sensor.magnet_mode() != MagnetMode::Force {
            return Err(self.unsupported("magnet_force"));
        }
        match sensor.request(ReadingKind::Magnet).await? {
            SensorReading::MagnetForce(_, force) => Ok(force),
            SensorReading::MagnetState(_) => Err(self.unsupported("magnet_force")),
            other => Err(unexpected_reading(&other)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_attitude_euler(&self) -> Result<AttitudeEuler, CubeError> {
        let channels = self.channels();
        let kind = ReadingKind::Attitude(AttitudeFormat::Euler);
        match channels.sensor()?.request(kind).await? {
            SensorReading::AttitudeEuler(euler) => Ok(euler),
            other => Err(unexpected_reading(&other)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_attitude_quaternion(&self) -> Result<AttitudeQuaternion, CubeError> {
        let channels = self.channels();
        let kind = ReadingKind::Attitude(AttitudeFormat::Quaternion);
        match channels.sensor()?.request(kind).await? {
            SensorReading::AttitudeQuaternion(quaternion) => Ok(quaternion),
            other => Err(unexpected_reading(&other)),
        }
    }

    // button & battery

    /// Whether the button is held down right now.
    #[tracing::instrument(skip(self))]
    pub async fn get_button_status(&self) -> Result<bool, CubeError> {
        let channels = self.channels();
        channels.button()?.pressed().await
    }

    /// Battery level in percent.
    #[tracing::instrument(skip(self))]
    pub async fn get_battery_status(&self) -> Result<u8, CubeError> {
        let channels = self.channels();
        channels.battery()?.level().await
    }

    // configuration

    /// Raw protocol version string, as reported by the cube.
    #[tracing::instrument(skip(self))]
    pub async fn get_protocol_version(&self) -> Result<String, CubeError> {
        let channels = self.channels();
        channels.configuration()?.request_version().await
    }

    /// Tilt in degrees beyond which the cube reports itself sloped.
    #[tracing::instrument(skip(self))]
    pub async fn set_flat_threshold(&self, degree: u8) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.configuration()?.set_flat_threshold(degree).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_collision_threshold(&self, level: u8) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.configuration()?.set_collision_threshold(level).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_double_tap_interval(&self, level: u8) -> Result<(), CubeError> {
        let channels = self.channels();
        channels.configuration()?.set_double_tap_interval(level).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_id_notification(
        &self,
        interval_ms: u16,
        condition: NotificationCondition,
    ) -> Result<(), CubeError> {
        let channels = self.channels();
        channels
            .configuration()?
            .set_id_notification(interval_ms, condition)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_id_missed_notification(&self, sensitivity_ms: u16) -> Result<(), CubeError> {
        let channels = self.channels();
        channels
            .configuration()?
            .set_id_missed_notification(sensitivity_ms)
            .await
    }

    /// Configure the magnet sensor. Later magnet frames are decoded in the
    /// new `mode`.
    #[tracing::instrument(skip(self))]
    pub async fn set_magnet_detection(
        &self,
        mode: MagnetMode,
        interval_ms: u16,
        condition: NotificationCondition,
    ) -> Result<(), CubeError> {
        let channels = self.channels();
        channels
            .configuration()?
            .set_magnet_detection(mode, interval_ms, condition)
            .await?;
        if let Ok(sensor) = channels.sensor() {
            sensor.set_magnet_mode(mode);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_motor_speed_feedback(&self, enabled: bool) -> Result<(), CubeError> {
        let channels = self.channels();
        channels
            .configuration()?
            .set_motor_speed_feedback(enabled)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_attitude_control(
        &self,
        format: AttitudeFormat,
        interval_ms: u16,
        condition: NotificationCondition,
    ) -> Result<(), CubeError> {
        let channels = self.channels();
        channels
            .configuration()?
            .set_attitude_control(format, interval_ms, condition)
            .await
    }
}

fn unexpected_reading(reading: &SensorReading) -> CubeError {
    tracing::warn!(?reading, "sensor answered with another reading kind");
    CubeError::transport(DecodeError::InvalidValue {
        field: "sensor reading kind",
        value: 0,
    })
}

impl<T: Transport> std::fmt::Debug for Cube<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cube")
            .field("id", &self.transport.id())
            .field("state", &self.state())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cubelink_domain::error::{ErrorKind, TransportError};

    use crate::channels::mock::MockChannel;

    struct MockTransport {
        channels: Vec<Arc<MockChannel>>,
        fail_connect: bool,
        disconnects: AtomicUsize,
    }

    impl MockTransport {
        fn with(domains: &[Domain]) -> Self {
            Self {
                channels: domains
                    .iter()
                    .map(|domain| Arc::new(MockChannel::for_domain(*domain)))
                    .collect(),
                fail_connect: false,
                disconnects: AtomicUsize::new(0),
            }
        }

        fn channel(&self, domain: Domain) -> &Arc<MockChannel> {
            self.channels
                .iter()
                .find(|channel| channel.uuid == domain.uuid())
                .unwrap()
        }
    }

    impl Transport for MockTransport {
        type Channel = Arc<MockChannel>;

        fn id(&self) -> CubeId {
            CubeId::new("mock")
        }

        async fn connect(&self) -> Result<(), TransportError> {
            if self.fail_connect {
                return Err("radio off".into());
            }
            Ok(())
        }

        async fn discover(&self) -> Result<Vec<Arc<MockChannel>>, TransportError> {
            Ok(self.channels.clone())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn connect_with_version(cube: &Arc<Cube<MockTransport>>, version: &[u8]) {
        let configuration = Arc::clone(cube.transport().channel(Domain::Configuration));
        let requests = configuration.written().len();
        let task = {
            let cube = Arc::clone(cube);
            tokio::spawn(async move { cube.connect().await })
        };
        while configuration.written().len() == requests {
            tokio::task::yield_now().await;
        }
        let notifier = configuration.notifier.lock().unwrap().clone().unwrap();
        let mut reply = vec![0x81, 0x00];
        reply.extend_from_slice(version);
        notifier.send(reply).await.unwrap();
        task.await.unwrap().unwrap();
    }

    fn cube(domains: &[Domain]) -> Arc<Cube<MockTransport>> {
        Arc::new(Cube::new(MockTransport::with(domains), CubeConfig::default()))
    }

    #[tokio::test]
    async fn should_connect_and_prime_sensor() {
        let cube = cube(&Domain::ALL);
        connect_with_version(&cube, b"2.3.0").await;

        assert_eq!(cube.state(), ConnectionState::Connected);
        assert_eq!(cube.version(), Some(ProtocolVersion::new(2, 3, 0)));
        assert_eq!(cube.domains(), Domain::ALL.to_vec());
        assert_eq!(
            cube.transport().channel(Domain::Sensor).written(),
            vec![vec![0x81], vec![0x82]]
        );
    }

    #[tokio::test]
    async fn should_encode_commands_for_negotiated_version() {
        let cube = cube(&[Domain::Motor, Domain::Configuration]);
        connect_with_version(&cube, b"2.0.0").await;

        cube.move_wheels(10, -10, 0).await.unwrap();

        assert_eq!(
            cube.transport().channel(Domain::Motor).written(),
            vec![vec![0x02, 0x01, 0x01, 0x0a, 0x02, 0x02, 0x0a, 0x00]]
        );
    }

    #[tokio::test]
    async fn should_fail_uniformly_for_missing_domains() {
        let cube = cube(&[Domain::Configuration]);
        connect_with_version(&cube, b"2.1.0").await;

        let errors = [
            cube.stop().await.unwrap_err(),
            cube.turn_off_light().await.unwrap_err(),
            cube.stop_sound().await.unwrap_err(),
            cube.get_battery_status().await.unwrap_err(),
            cube.get_orientation().await.unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        }
    }

    #[tokio::test]
    async fn should_refuse_commands_while_disconnected() {
        let cube = cube(&Domain::ALL);
        let err = cube.move_wheels(0, 0, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        assert!(cube.transport().channel(Domain::Motor).written().is_empty());
    }

    #[tokio::test]
    async fn should_require_configuration_channel() {
        let cube = cube(&[Domain::Motor, Domain::Light]);
        let err = cube.connect().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        assert_eq!(cube.state(), ConnectionState::Disconnected);
        assert_eq!(cube.transport().disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_return_to_disconnected_on_transport_failure() {
        let mut transport = MockTransport::with(&Domain::ALL);
        transport.fail_connect = true;
        let cube = Cube::new(transport, CubeConfig::default());

        let err = cube.connect().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "radio off"
        );
        assert_eq!(cube.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_settle_pending_reads_on_disconnect() {
        let cube = cube(&Domain::ALL);
        connect_with_version(&cube, b"2.3.0").await;

        let pending = {
            let cube = Arc::clone(&cube);
            tokio::spawn(async move { cube.get_slope_status().await })
        };
        let sensor = Arc::clone(cube.transport().channel(Domain::Sensor));
        while sensor.written().len() < 3 {
            tokio::task::yield_now().await;
        }
        cube.disconnect().await.unwrap();

        assert_eq!(
            pending.await.unwrap().unwrap_err().kind(),
            ErrorKind::ConnectionClosed
        );
        assert_eq!(cube.state(), ConnectionState::Disconnected);
        assert_eq!(cube.version(), None);
    }

    #[tokio::test]
    async fn should_switch_magnet_decoding_with_detection_mode() {
        let cube = cube(&Domain::ALL);
        connect_with_version(&cube, b"2.3.0").await;

        let err = cube.get_magnet_force().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        cube.set_magnet_detection(MagnetMode::Force, 100, NotificationCondition::Always)
            .await
            .unwrap();
        assert_eq!(
            cube.transport().channel(Domain::Configuration).written()[1],
            vec![0x1b, 0x00, 0x02, 0x05, 0x00]
        );

        let pending = {
            let cube = Arc::clone(&cube);
            tokio::spawn(async move { cube.get_magnet_force().await })
        };
        let sensor = Arc::clone(cube.transport().channel(Domain::Sensor));
        while sensor.written().len() < 3 {
            tokio::task::yield_now().await;
        }
        let notifier = sensor.notifier.lock().unwrap().clone().unwrap();
        notifier
            .send(vec![0x02, 0x01, 0x20, 0x00, 0x00, 0x7f])
            .await
            .unwrap();

        let force = pending.await.unwrap().unwrap();
        assert_eq!(force.force, 0x20);
        assert_eq!(force.direction_z, 0x7f);
    }

    #[tokio::test]
    async fn should_forward_events_to_listeners() {
        let cube = cube(&Domain::ALL);
        connect_with_version(&cube, b"2.1.0").await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = Arc::clone(&seen);
            cube.on(EventName::ButtonState, move |event| {
                seen.lock().unwrap().push(event.clone());
            })
        };

        let notifier = cube
            .transport()
            .channel(Domain::Button)
            .notifier
            .lock()
            .unwrap()
            .clone()
            .unwrap();
        let mut rx = cube.subscribe();
        notifier.send(vec![0x01, 0x80]).await.unwrap();
        rx.recv().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![CubeEvent::ButtonState { pressed: true }]
        );
        assert!(cube.off(EventName::ButtonState, id));
    }

    #[tokio::test]
    async fn should_disconnect_and_reconnect_after_link_loss() {
        let cube = cube(&Domain::ALL);
        connect_with_version(&cube, b"2.3.0").await;

        for channel in &cube.transport().channels {
            channel.notifier.lock().unwrap().take();
        }
        for _ in 0..100 {
            if cube.state() == ConnectionState::Disconnected {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(cube.state(), ConnectionState::Disconnected);
        assert_eq!(cube.version(), None);
        assert!(cube.domains().is_empty());
        let err = cube.get_slope_status().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);

        connect_with_version(&cube, b"2.1.0").await;

        assert_eq!(cube.state(), ConnectionState::Connected);
        assert_eq!(cube.version(), Some(ProtocolVersion::new(2, 1, 0)));
        assert_eq!(
            cube.transport().channel(Domain::Configuration).written().len(),
            2
        );
        cube.stop().await.unwrap();
    }
}
