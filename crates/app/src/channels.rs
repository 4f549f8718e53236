//! Channel handlers: one per domain, each bound to one sub-channel.
//!
//! A handler encodes commands with its domain codec, writes them to its
//! sub-channel and decodes the notifications pumped from that sub-channel.
//! Handlers never share state with each other.

pub(crate) mod battery;
pub(crate) mod button;
pub(crate) mod configuration;
pub(crate) mod light;
pub(crate) mod motion_id;
pub(crate) mod motor;
pub(crate) mod sensor;
pub(crate) mod sound;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cubelink_domain::channel::Domain;
use cubelink_domain::command::Command;
use cubelink_domain::error::CubeError;

use crate::pending::Shutdown;
use crate::ports::SubChannel;

/// Receives the notification frames of one sub-channel.
pub(crate) trait NotificationSink: Send + Sync + 'static {
    fn domain(&self) -> Domain;

    /// Handle one frame. Malformed frames are logged and dropped.
    fn on_notification(&self, data: &[u8]);

    /// The notification stream ended; settle anything still pending.
    fn on_closed(&self);
}

/// Shared by the pumps of one connection; raised by the first notification
/// stream the transport ends.
#[derive(Debug, Default)]
pub(crate) struct LinkStatus {
    lost: AtomicBool,
}

impl LinkStatus {
    pub(crate) fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

/// Subscribe to `channel` and feed every frame to `sink`, in arrival order,
/// until the stream ends. The end of the stream marks `link` as lost.
pub(crate) async fn spawn_pump<C, S>(
    channel: &C,
    sink: Arc<S>,
    link: Arc<LinkStatus>,
) -> Result<JoinHandle<()>, CubeError>
where
    C: SubChannel,
    S: NotificationSink,
{
    let rx = channel.subscribe().await.map_err(CubeError::Transport)?;
    Ok(tokio::spawn(pump(rx, sink, link)))
}

async fn pump<S: NotificationSink>(
    mut rx: mpsc::Receiver<Vec<u8>>,
    sink: Arc<S>,
    link: Arc<LinkStatus>,
) {
    let domain = sink.domain();
    tracing::debug!(%domain, "notification pump started");
    while let Some(frame) = rx.recv().await {
        sink.on_notification(&frame);
    }
    tracing::debug!(%domain, "notification stream ended");
    link.mark_lost();
    sink.on_closed();
}

/// Write an encoded command to `channel`.
pub(crate) async fn write<C: SubChannel>(channel: &C, command: Command) -> Result<(), CubeError> {
    tracing::trace!(domain = %command.domain(), opcode = command.opcode(), "write");
    channel
        .write(command.bytes())
        .await
        .map_err(CubeError::Transport)
}

/// Read `channel`, bounded by `timeout` and cut short by `shutdown`.
pub(crate) async fn read<C: SubChannel>(
    channel: &C,
    domain: Domain,
    timeout: Duration,
    shutdown: &Shutdown,
) -> Result<Vec<u8>, CubeError> {
    if shutdown.is_closed() {
        return Err(CubeError::ConnectionClosed);
    }
    tokio::select! {
        result = tokio::time::timeout(timeout, channel.read()) => match result {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(err)) => Err(CubeError::Transport(err)),
            Err(_) => {
                tracing::debug!(%domain, "read timed out");
                Err(CubeError::ReplyTimeout { domain })
            }
        },
        () = shutdown.closed() => Err(CubeError::ConnectionClosed),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory sub-channel used by handler tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use cubelink_domain::channel::Domain;
    use cubelink_domain::error::TransportError;

    use crate::ports::SubChannel;

    #[derive(Default)]
    pub(crate) struct MockChannel {
        pub(crate) uuid: uuid::Uuid,
        pub(crate) writes: Mutex<Vec<Vec<u8>>>,
        pub(crate) reads: Mutex<VecDeque<Vec<u8>>>,
        pub(crate) fail_writes: bool,
        pub(crate) notifier: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    }

    impl MockChannel {
        pub(crate) fn for_domain(domain: Domain) -> Self {
            Self {
                uuid: domain.uuid(),
                ..Self::default()
            }
        }

        pub(crate) fn written(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl SubChannel for MockChannel {
        fn uuid(&self) -> uuid::Uuid {
            self.uuid
        }

        async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
            if self.fail_writes {
                return Err("write refused".into());
            }
            self.writes.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn read(&self) -> Result<Vec<u8>, TransportError> {
            let next = self.reads.lock().unwrap().pop_front();
            match next {
                Some(value) => Ok(value),
                None => std::future::pending().await,
            }
        }

        async fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
            let (tx, rx) = mpsc::channel(16);
            *self.notifier.lock().unwrap() = Some(tx);
            Ok(rx)
        }
    }
}
