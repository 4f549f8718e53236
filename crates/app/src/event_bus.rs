//! In-process event bus: named listeners plus a tokio broadcast stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use cubelink_domain::event::{CubeEvent, EventName};
use cubelink_domain::id::ListenerId;

type Listener = Arc<dyn Fn(&CubeEvent) + Send + Sync>;

/// Routes decoded events to listeners registered by [`EventName`].
///
/// Listeners run synchronously on the task that decoded the frame, in the
/// order they were added. A listener added or removed while an event is
/// being dispatched takes effect from the next event. Every event is also
/// sent to the broadcast stream returned by [`subscribe`](Self::subscribe);
/// sending succeeds even when there are no receivers.
pub struct EventBus {
    listeners: Mutex<HashMap<EventName, Vec<(ListenerId, Listener)>>>,
    sender: broadcast::Sender<CubeEvent>,
}

impl EventBus {
    /// Create a new event bus whose broadcast stream holds `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Register `listener` for events named `name`.
    pub fn on<F>(&self, name: EventName, listener: F) -> ListenerId
    where
        F: Fn(&CubeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` when it was not registered for
    /// `name`.
    pub fn off(&self, name: EventName, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = listeners.get_mut(&name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(candidate, _)| *candidate != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(&name);
        }
        removed
    }

    /// Subscribe to every event published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CubeEvent> {
        self.sender.subscribe()
    }

    /// Dispatch `event` to its listeners, then to the broadcast stream.
    pub fn publish(&self, event: CubeEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.name())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in snapshot {
            listener(&event);
        }
        // broadcast::send fails only when there are zero receivers.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(
        bus: &EventBus,
        name: EventName,
        tag: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> ListenerId {
        let log = Arc::clone(log);
        bus.on(name, move |event| {
            log.lock().unwrap().push(format!("{tag}:{}", event.name()));
        })
    }

    #[test]
    fn should_call_listeners_in_subscription_order() {
        let bus = EventBus::new(16);
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, EventName::BatteryLevel, "a", &log);
        recorder(&bus, EventName::BatteryLevel, "b", &log);

        bus.publish(CubeEvent::BatteryLevel(50));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:battery-level".to_string(), "b:battery-level".to_string()]
        );
    }

    #[test]
    fn should_only_call_listeners_of_matching_name() {
        let bus = EventBus::new(16);
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, EventName::ButtonState, "button", &log);

        bus.publish(CubeEvent::BatteryLevel(50));

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn should_stop_calling_removed_listener() {
        let bus = EventBus::new(16);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = bus.on(EventName::PositionLost, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(CubeEvent::PositionLost);
        assert!(bus.off(EventName::PositionLost, id));
        bus.publish(CubeEvent::PositionLost);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!bus.off(EventName::PositionLost, id));
    }

    #[test]
    fn should_report_unknown_listener_on_off() {
        let bus = EventBus::new(16);
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = recorder(&bus, EventName::Slope, "slope", &log);

        assert!(!bus.off(EventName::Collision, id));
        bus.publish(CubeEvent::Slope { is_sloped: true });

        assert_eq!(*log.lock().unwrap(), vec!["slope:slope".to_string()]);
    }

    #[test]
    fn should_allow_listener_to_register_another_listener() {
        let bus = Arc::new(EventBus::new(16));
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&bus);
        let counter = Arc::clone(&calls);
        bus.on(EventName::DoubleTap, move |_| {
            let counter = Arc::clone(&counter);
            inner.on(EventName::DoubleTap, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        let tap = CubeEvent::DoubleTap {
            is_double_tapped: true,
        };

        bus.publish(tap.clone());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        bus.publish(tap);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_deliver_event_to_broadcast_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(CubeEvent::ButtonState { pressed: true });

        assert_eq!(
            rx.recv().await.unwrap(),
            CubeEvent::ButtonState { pressed: true }
        );
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = EventBus::new(16);
        bus.publish(CubeEvent::StandardIdLost);
    }
}
