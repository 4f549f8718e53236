//! # cubelink-adapter-virtual
//!
//! In-memory robot cube implementing the transport port. It answers the
//! wire protocol the way real firmware does, which makes it the transport
//! of choice for tests and for running `cubectl` without hardware.
//!
//! ## Simulated behaviour
//!
//! | Written frame | Reply |
//! |---------------|-------|
//! | configuration `01 00` | `81 00` + firmware string |
//! | configuration `18`, `19`, `1b`, `1c`, `1d` | `op\|0x80 00 00` acknowledgement |
//! | sensor `81`, `82`, `83 fmt` | current motion, magnet or attitude frame |
//! | motor `04 req …` | `84 req outcome`, when an outcome is configured |
//!
//! Button and battery are readable. Everything else is accepted silently
//! and recorded, see [`VirtualCube::written`].
//!
//! ## Dependency rule
//!
//! Depends on `cubelink-app` (port traits) and `cubelink-domain` only.

mod error;
mod model;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

use cubelink_app::ports::{SubChannel, Transport};
use cubelink_domain::channel::Domain;
use cubelink_domain::error::TransportError;
use cubelink_domain::id::CubeId;

pub use error::VirtualError;
pub use model::CubeModel;

const DEFAULT_NOTIFICATION_BUFFER: usize = 64;

/// Runtime state shared by the cube and its characteristics.
struct Link {
    connected: AtomicBool,
    refuse_connect: AtomicBool,
    model: Mutex<CubeModel>,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Vec<u8>>>>,
    writes: Mutex<Vec<(Domain, Vec<u8>)>>,
    notification_buffer: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Link {
    fn ensure_connected(&self) -> Result<(), VirtualError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VirtualError::NotConnected)
        }
    }

    async fn notify(&self, uuid: Uuid, frame: Vec<u8>) -> Result<(), VirtualError> {
        let sender = lock(&self.subscribers).get(&uuid).cloned();
        let Some(sender) = sender else {
            return Err(VirtualError::NotSubscribed(uuid));
        };
        // a receiver dropped mid-send means the link is going away
        let _ = sender.send(frame).await;
        Ok(())
    }

    fn drop_subscribers(&self) {
        lock(&self.subscribers).clear();
    }
}

/// Simulated cube reachable without a radio.
pub struct VirtualCube {
    id: CubeId,
    domains: Vec<Domain>,
    foreign: Vec<Uuid>,
    link: Arc<Link>,
}

impl VirtualCube {
    /// Cube exposing every domain, in the state described by `model`.
    #[must_use]
    pub fn new(id: impl Into<String>, model: CubeModel) -> Self {
        Self::with_buffer(id, model, DEFAULT_NOTIFICATION_BUFFER)
    }

    /// Like [`new`](Self::new), with `buffer` notifications queued per
    /// characteristic.
    #[must_use]
    pub fn with_buffer(id: impl Into<String>, model: CubeModel, buffer: usize) -> Self {
        Self {
            id: CubeId::new(id),
            domains: Domain::ALL.to_vec(),
            foreign: Vec::new(),
            link: Arc::new(Link {
                connected: AtomicBool::new(false),
                refuse_connect: AtomicBool::new(false),
                model: Mutex::new(model),
                subscribers: Mutex::new(HashMap::new()),
                writes: Mutex::new(Vec::new()),
                notification_buffer: buffer.max(1),
            }),
        }
    }

    /// Expose only `domains`.
    #[must_use]
    pub fn with_domains(mut self, domains: &[Domain]) -> Self {
        self.domains = domains.to_vec();
        self
    }

    /// Also expose a characteristic outside the cube service.
    #[must_use]
    pub fn with_foreign_characteristic(mut self, uuid: Uuid) -> Self {
        self.foreign.push(uuid);
        self
    }

    /// Make the next connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    /// Change what the cube reports from now on.
    pub fn update(&self, change: impl FnOnce(&mut CubeModel)) {
        change(&mut lock(&self.link.model));
    }

    /// Snapshot of the simulated state.
    #[must_use]
    pub fn model(&self) -> CubeModel {
        lock(&self.link.model).clone()
    }

    /// Every frame written to `domain`, oldest first.
    #[must_use]
    pub fn written(&self, domain: Domain) -> Vec<Vec<u8>> {
        lock(&self.link.writes)
            .iter()
            .filter(|(target, _)| *target == domain)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Push a raw notification frame on `domain`, as if the cube sent it.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::NotSubscribed`] when nothing listens to the
    /// characteristic.
    pub async fn inject(
        &self,
        domain: Domain,
        frame: impl Into<Vec<u8>>,
    ) -> Result<(), VirtualError> {
        self.link.notify(domain.uuid(), frame.into()).await
    }

    /// Simulate the radio link dropping: every notification stream ends
    /// and further IO fails.
    pub fn drop_link(&self) {
        tracing::debug!(cube = %self.id, "virtual link dropped");
        self.link.connected.store(false, Ordering::SeqCst);
        self.link.drop_subscribers();
    }
}

impl Transport for VirtualCube {
    type Channel = VirtualChannel;

    fn id(&self) -> CubeId {
        self.id.clone()
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.link.refuse_connect.load(Ordering::SeqCst) {
            return Err(VirtualError::ConnectRefused.into());
        }
        self.link.connected.store(true, Ordering::SeqCst);
        tracing::debug!(cube = %self.id, "virtual cube connected");
        Ok(())
    }

    async fn discover(&self) -> Result<Vec<VirtualChannel>, TransportError> {
        self.link.ensure_connected()?;
        let known = self.domains.iter().map(|domain| VirtualChannel {
            uuid: domain.uuid(),
            domain: Some(*domain),
            link: Arc::clone(&self.link),
        });
        let foreign = self.foreign.iter().map(|uuid| VirtualChannel {
            uuid: *uuid,
            domain: None,
            link: Arc::clone(&self.link),
        });
        Ok(known.chain(foreign).collect())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.link.connected.store(false, Ordering::SeqCst);
        self.link.drop_subscribers();
        tracing::debug!(cube = %self.id, "virtual cube disconnected");
        Ok(())
    }
}

/// One characteristic of a [`VirtualCube`].
pub struct VirtualChannel {
    uuid: Uuid,
    domain: Option<Domain>,
    link: Arc<Link>,
}

impl SubChannel for VirtualChannel {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        self.link.ensure_connected()?;
        let Some(domain) = self.domain else {
            return Ok(());
        };
        lock(&self.link.writes).push((domain, data.to_vec()));
        let replies = lock(&self.link.model).respond(domain, data);
        for (target, frame) in replies {
            if let Err(err) = self.link.notify(target.uuid(), frame).await {
                tracing::trace!(%err, "reply dropped");
            }
        }
        Ok(())
    }

    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        self.link.ensure_connected()?;
        let value = self
            .domain
            .and_then(|domain| lock(&self.link.model).read(domain));
        value.ok_or_else(|| VirtualError::NotReadable(self.uuid).into())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.link.ensure_connected()?;
        let (tx, rx) = mpsc::channel(self.link.notification_buffer);
        lock(&self.link.subscribers).insert(self.uuid, tx);
        Ok(rx)
    }
}
