//! Pending-reply slots: one outstanding correlated request per handler.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};

use cubelink_domain::channel::Domain;
use cubelink_domain::error::CubeError;

type Reply<T> = oneshot::Sender<Result<T, CubeError>>;

struct Entry<K, T> {
    ticket: u64,
    key: K,
    reply: Reply<T>,
}

struct SlotState<K, T> {
    next_ticket: u64,
    entry: Option<Entry<K, T>>,
    closed: bool,
}

/// Holds at most one in-flight request, keyed by `K`, awaiting a reply `T`.
///
/// The slot is settled exactly once: by a matching reply, by the waiter's
/// own timeout, by being displaced, or by [`close`](Self::close).
pub(crate) struct PendingSlot<K, T> {
    state: Mutex<SlotState<K, T>>,
    vacancy: Notify,
}

/// Receiving half handed to the caller that registered a request.
pub(crate) struct Pending<T> {
    ticket: u64,
    reply: oneshot::Receiver<Result<T, CubeError>>,
}

/// A request pushed out of the slot by a newer one.
pub(crate) struct Displaced<K, T> {
    pub(crate) key: K,
    reply: Reply<T>,
}

impl<K, T> Displaced<K, T> {
    pub(crate) fn settle(self, value: Result<T, CubeError>) {
        let _ = self.reply.send(value);
    }
}

impl<K, T> PendingSlot<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                next_ticket: 0,
                entry: None,
                closed: false,
            }),
            vacancy: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<K, T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(state: &mut SlotState<K, T>, key: K) -> (Pending<T>, Option<Entry<K, T>>) {
        let (tx, rx) = oneshot::channel();
        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);
        let previous = state.entry.replace(Entry {
            ticket,
            key,
            reply: tx,
        });
        (Pending { ticket, reply: rx }, previous)
    }

    /// Register `key`, displacing whatever request occupied the slot.
    pub(crate) fn replace(
        &self,
        key: K,
    ) -> Result<(Pending<T>, Option<Displaced<K, T>>), CubeError> {
        let mut state = self.lock();
        if state.closed {
            return Err(CubeError::ConnectionClosed);
        }
        let (pending, previous) = Self::insert(&mut state, key);
        Ok((
            pending,
            previous.map(|entry| Displaced {
                key: entry.key,
                reply: entry.reply,
            }),
        ))
    }

    /// Register `key` once the slot is vacant.
    pub(crate) async fn register_when_vacant(&self, key: K) -> Result<Pending<T>, CubeError> {
        let mut key = Some(key);
        loop {
            let mut notified = pin!(self.vacancy.notified());
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(CubeError::ConnectionClosed);
                }
                if state.entry.is_none()
                    && let Some(key) = key.take()
                {
                    return Ok(Self::insert(&mut state, key).0);
                }
            }
            notified.await;
        }
    }

    /// Settle the in-flight request if its key satisfies `matches`.
    /// Returns `true` when a request was settled.
    pub(crate) fn settle_if(&self, matches: impl FnOnce(&K) -> bool, value: T) -> bool {
        let entry = {
            let mut state = self.lock();
            let matched = state
                .entry
                .as_ref()
                .is_some_and(|entry| matches(&entry.key));
            if matched { state.entry.take() } else { None }
        };
        let Some(entry) = entry else {
            return false;
        };
        let _ = entry.reply.send(Ok(value));
        self.vacancy.notify_waiters();
        true
    }

    /// Withdraw a request whose command could not be sent.
    pub(crate) fn abandon(&self, pending: Pending<T>) {
        self.cancel(pending.ticket);
    }

    /// Drop the request registered under `ticket`, if it is still there.
    fn cancel(&self, ticket: u64) {
        let removed = {
            let mut state = self.lock();
            let matched = state
                .entry
                .as_ref()
                .is_some_and(|entry| entry.ticket == ticket);
            if matched { state.entry.take() } else { None }
        };
        if removed.is_some() {
            self.vacancy.notify_waiters();
        }
    }

    /// Refuse new requests and settle the in-flight one with
    /// [`CubeError::ConnectionClosed`].
    pub(crate) fn close(&self) {
        let entry = {
            let mut state = self.lock();
            state.closed = true;
            state.entry.take()
        };
        if let Some(entry) = entry {
            let _ = entry.reply.send(Err(CubeError::ConnectionClosed));
        }
        self.vacancy.notify_waiters();
    }

    /// Wait for the reply to `pending`, at most `timeout`.
    ///
    /// On expiry the request is removed from the slot so the next one can
    /// proceed.
    pub(crate) async fn wait(
        &self,
        pending: Pending<T>,
        timeout: Duration,
        domain: Domain,
    ) -> Result<T, CubeError> {
        match tokio::time::timeout(timeout, pending.reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CubeError::ConnectionClosed),
            Err(_) => {
                self.cancel(pending.ticket);
                tracing::debug!(%domain, "reply timed out");
                Err(CubeError::ReplyTimeout { domain })
            }
        }
    }
}

/// Close signal shared by handlers whose operations are plain transport
/// reads rather than correlated requests.
pub(crate) struct Shutdown {
    closed: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolve once [`close`](Self::close) has been called.
    pub(crate) async fn closed(&self) {
        let mut notified = pin!(self.notify.notified());
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}
