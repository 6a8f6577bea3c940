//! In-memory event bus for tests/dev.

use std::sync::{Mutex, mpsc};

use crate::bus::Subscription;
use crate::event::LifecycleEvent;
use crate::sink::EventSink;

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Best-effort fan-out to every live subscription
/// - Messages published before a subscription exists are not replayed
#[derive(Debug)]
pub struct InMemoryEventBus<M = LifecycleEvent> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    pub fn send(&self, message: M) -> Result<(), InMemoryBusError> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    pub fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

impl EventSink for InMemoryEventBus<LifecycleEvent> {
    type Error = InMemoryBusError;

    fn publish(&self, event: LifecycleEvent) -> Result<(), Self::Error> {
        self.send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_to_every_subscriber() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.send(7).unwrap();

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.send(1).unwrap();
        bus.send(2).unwrap();

        assert_eq!(kept.drain(), vec![1, 2]);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}
