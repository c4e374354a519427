//! Event subscribers and broadcast
//!
//! [`ListenerRegistry`] owns the set of [`CordConfigListener`]s and fans each
//! event out to all of them on the caller's thread.
//!
//! ## Snapshot Semantics
//!
//! The subscriber set is copy-on-write. `publish()` loads the current set
//! once and iterates that snapshot, so:
//! - a listener added while an event is being published does not get it
//! - a listener removed while an event is being published may still get it
//! - subscribe/unsubscribe never wait for a publish to finish
//!
//! ## Failure Isolation
//!
//! A listener that returns `Err` or panics is logged and skipped; the
//! remaining listeners still receive the event and the publisher never sees
//! the failure.

pub mod channel;

pub use channel::{ChannelListener, EventStream};

use arc_swap::ArcSwap;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::event::CordConfigEvent;
use crate::traits::{CordConfigListener, same_listener};

type Listeners = Vec<Arc<dyn CordConfigListener>>;

/// Registry of event subscribers and broadcaster of events to them
pub struct ListenerRegistry {
    listeners: ArcSwap<Listeners>,
}

impl ListenerRegistry {
    /// Create a registry with no subscribers
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Subscribe `listener`
    pub fn add_listener(&self, listener: Arc<dyn CordConfigListener>) {
        self.listeners.rcu(|current| {
            let mut next = Listeners::clone(current);
            next.push(listener.clone());
            next
        });
    }

    /// Unsubscribe `listener`, returning `true` if it was subscribed
    pub fn remove_listener(&self, listener: &Arc<dyn CordConfigListener>) -> bool {
        let previous = self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|l| !same_listener(*l, listener))
                .cloned()
                .collect::<Listeners>()
        });
        previous.iter().any(|l| same_listener(l, listener))
    }

    /// Number of current subscribers
    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    /// Deliver `event` to every current subscriber
    pub fn publish(&self, event: &CordConfigEvent) {
        let listeners = self.listeners.load_full();
        debug!(
            "Publishing {} for {} to {} listener(s)",
            event.kind(),
            event.device_id(),
            listeners.len()
        );

        for listener in listeners.iter() {
            let delivery = catch_unwind(AssertUnwindSafe(|| {
                if listener.is_relevant(event) {
                    listener.event(event)
                } else {
                    Ok(())
                }
            }));

            match delivery {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Listener failed to handle {}: {:#}", event.kind(), e);
                }
                Err(panic) => {
                    error!(
                        "Listener panicked while handling {}: {}",
                        event.kind(),
                        panic_message(&*panic)
                    );
                }
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessDeviceData, PortNumber, VlanId};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counting {
        seen: Mutex<usize>,
    }

    impl CordConfigListener for Counting {
        fn event(&self, _event: &CordConfigEvent) -> anyhow::Result<()> {
            *self.seen.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn event() -> CordConfigEvent {
        CordConfigEvent::added(AccessDeviceData::new(
            "of:1".parse().unwrap(),
            PortNumber(1),
            VlanId::new(1).unwrap(),
            None,
        ))
    }

    #[test]
    fn test_add_and_remove() {
        let registry = ListenerRegistry::new();
        let counting = Arc::new(Counting::default());
        let listener: Arc<dyn CordConfigListener> = counting.clone();

        registry.add_listener(listener.clone());
        assert_eq!(registry.listener_count(), 1);

        registry.publish(&event());
        assert_eq!(*counting.seen.lock().unwrap(), 1);

        assert!(registry.remove_listener(&listener));
        assert!(!registry.remove_listener(&listener));
        assert_eq!(registry.listener_count(), 0);

        registry.publish(&event());
        assert_eq!(*counting.seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_remove_only_matches_same_instance() {
        let registry = ListenerRegistry::new();
        let first: Arc<dyn CordConfigListener> = Arc::new(Counting::default());
        let second: Arc<dyn CordConfigListener> = Arc::new(Counting::default());

        registry.add_listener(first.clone());
        assert!(!registry.remove_listener(&second));
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
    }
}
