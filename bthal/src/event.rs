//! Waiting for specific callbacks from the stack.

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::oneshot;

use crate::{
    hal::{AclState, AdapterState, BondState, DiscoveryState},
    Address, Error, ErrorKind, Result, Status,
};

/// Adapter event reported by the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum HalEvent {
    /// Adapter was switched on or off.
    AdapterState(AdapterState),
    /// Local adapter address was reported.
    LocalAddress(Address),
    /// Device discovery started or stopped.
    DiscoveryState(DiscoveryState),
    /// Bonding state with a remote device changed.
    BondState {
        /// Remote device.
        address: Address,
        /// New state.
        state: BondState,
    },
    /// ACL link state with a remote device changed.
    AclState {
        /// Remote device.
        address: Address,
        /// New state.
        state: AclState,
    },
    /// LE test mode ended.
    LeTestMode {
        /// Request status.
        status: Status,
        /// Number of packets received.
        packets: u16,
    },
}

type Filter = Box<dyn Fn(&HalEvent) -> bool + Send>;

struct Waiter {
    filter: Filter,
    tx: oneshot::Sender<HalEvent>,
}

/// Delivers events published from callback threads to registered one-shot waiters.
#[derive(Clone, Default)]
pub struct EventBus {
    waiters: Arc<Mutex<Vec<Waiter>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventBus").field("waiters", &self.pending()).finish()
    }
}

impl EventBus {
    /// Creates an event bus without waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in the next event matching `filter`.
    ///
    /// Must be called before issuing the request that causes the event,
    /// otherwise the event may be missed.
    pub fn expect(&self, what: &str, filter: impl Fn(&HalEvent) -> bool + Send + 'static) -> Expectation {
        let (tx, rx) = oneshot::channel();
        self.lock().push(Waiter { filter: Box::new(filter), tx });
        Expectation { what: what.to_string(), rx }
    }

    /// Wakes all waiters whose filter matches `event`.
    pub fn publish(&self, event: &HalEvent) {
        let mut waiters = self.lock();
        let mut i = 0;
        while i < waiters.len() {
            if waiters[i].tx.is_closed() {
                waiters.swap_remove(i);
            } else if (waiters[i].filter)(event) {
                let waiter = waiters.swap_remove(i);
                let _ = waiter.tx.send(event.clone());
            } else {
                i += 1;
            }
        }
    }

    /// Number of registered waiters.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Waiter>> {
        self.waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pending wait for one event.
#[derive(Debug)]
pub struct Expectation {
    what: String,
    rx: oneshot::Receiver<HalEvent>,
}

impl Expectation {
    /// Waits for the event for at most `timeout`.
    pub async fn wait(self, timeout: Duration) -> Result<HalEvent> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(Error::with_message(ErrorKind::Internal, "event bus dropped")),
            Err(_) => Err(Error::new(ErrorKind::Timeout(self.what))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_matching_event() {
        let bus = EventBus::new();
        let on = bus.expect("adapter on", |evt| *evt == HalEvent::AdapterState(AdapterState::On));

        let publisher = bus.clone();
        std::thread::spawn(move || {
            publisher.publish(&HalEvent::DiscoveryState(DiscoveryState::Started));
            publisher.publish(&HalEvent::AdapterState(AdapterState::On));
        });

        let event = on.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(event, HalEvent::AdapterState(AdapterState::On));
        assert_eq!(bus.pending(), 0);
    }

    #[tokio::test]
    async fn times_out() {
        let bus = EventBus::new();
        let on = bus.expect("adapter on", |evt| matches!(evt, HalEvent::AdapterState(AdapterState::On)));
        bus.publish(&HalEvent::AdapterState(AdapterState::Off));

        let err = on.wait(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout("adapter on".into()));
        assert_eq!(err.to_string(), "timed out waiting for adapter on");
    }

    #[test]
    fn drops_abandoned_waiters() {
        let bus = EventBus::new();
        drop(bus.expect("anything", |_| true));
        bus.publish(&HalEvent::AdapterState(AdapterState::Off));
        assert_eq!(bus.pending(), 0);
    }
}
