//! # cubectl: drive a robot cube from the command line
//!
//! Composition root that wires a transport adapter to the cube facade and
//! runs a short session against it.
//!
//! ## Responsibilities
//! - Load configuration (`cubelink.toml`, env vars)
//! - Initialise the tracing subscriber
//! - Build the configured transport (virtual cube or BLE)
//! - Connect, exercise a few commands, then stream events until Ctrl-C
//! - Disconnect cleanly
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no protocol logic belongs here.

mod config;

use anyhow::Context as _;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use cubelink_adapter_ble::BleConfig;
use cubelink_adapter_virtual::{CubeModel, VirtualCube};
use cubelink_app::Cube;
use cubelink_app::ports::Transport;
use cubelink_domain::error::{CubeError, ErrorKind};
use cubelink_domain::event::EventName;
use cubelink_domain::protocol::configuration::NotificationCondition;
use cubelink_domain::protocol::light::LightOperation;
use cubelink_domain::protocol::motor::{MoveToOptions, MoveToTarget};

use crate::config::{Config, TransportKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).context("invalid log filter")?,
        )
        .init();

    match config.transport.kind {
        TransportKind::Virtual => {
            let model = CubeModel::with_firmware(config.transport.firmware.as_str());
            let transport =
                VirtualCube::with_buffer("virtual-cube", model, config.cube.notification_buffer);
            run(Cube::new(transport, config.cube)).await
        }
        TransportKind::Ble => {
            let ble = BleConfig {
                address: config.transport.address.clone(),
                locate_timeout_secs: config.transport.locate_timeout_secs,
                notification_buffer: config.cube.notification_buffer,
            };
            let transport = cubelink_adapter_ble::locate(&ble)
                .await
                .context("failed to locate a cube")?;
            run(Cube::new(transport, config.cube)).await
        }
    }
}

async fn run<T: Transport>(cube: Cube<T>) -> anyhow::Result<()> {
    cube.connect().await.context("failed to connect")?;
    let result = session(&cube).await;
    cube.disconnect().await.context("failed to disconnect")?;
    result
}

async fn session<T: Transport>(cube: &Cube<T>) -> anyhow::Result<()> {
    tracing::info!(
        cube = %cube.id(),
        version = ?cube.version(),
        domains = ?cube.domains(),
        "session started"
    );

    let button = cube.on(EventName::ButtonState, |event| {
        tracing::info!(?event, "button");
    });

    report(cube.get_battery_status().await, "battery level")?;
    report(cube.get_orientation().await, "orientation")?;
    report(cube.get_protocol_version().await, "protocol version")?;

    report(
        cube.turn_on_light(&LightOperation {
            duration_ms: 0,
            red: 0,
            green: 255,
            blue: 0,
        })
        .await,
        "light on",
    )?;
    report(cube.play_preset_sound(0).await, "sound")?;
    report(
        cube.set_id_notification(100, NotificationCondition::OnChange)
            .await,
        "id notifications",
    )?;
    report(
        cube.move_to(&[MoveToTarget::pose(250, 250, 90)], &MoveToOptions::default())
            .await,
        "move to",
    )?;

    stream_events(cube).await;

    cube.off(EventName::ButtonState, button);
    report(cube.stop().await, "stop")?;
    report(cube.turn_off_light().await, "light off")?;
    Ok(())
}

/// Log the outcome of one command. Missing capabilities and features the
/// firmware lacks are expected on some cubes; everything else ends the
/// session.
fn report<V: std::fmt::Debug>(result: Result<V, CubeError>, what: &str) -> anyhow::Result<()> {
    match result {
        Ok(value) => {
            tracing::info!(?value, "{what}");
            Ok(())
        }
        Err(err @ (CubeError::CapabilityUnavailable | CubeError::Unsupported { .. })) => {
            tracing::warn!(%err, "{what} skipped");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::ReplyTimeout => {
            tracing::warn!(%err, "{what} got no reply");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("{what} failed")),
    }
}

async fn stream_events<T: Transport>(cube: &Cube<T>) {
    let mut events = cube.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    tracing::info!("streaming events, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => tracing::info!(name = %event.name(), ?event, "event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_skip_missing_capability() {
        assert!(report::<()>(Err(CubeError::CapabilityUnavailable), "light on").is_ok());
    }

    #[test]
    fn should_fail_on_closed_connection() {
        assert!(report::<()>(Err(CubeError::ConnectionClosed), "move to").is_err());
    }
}
