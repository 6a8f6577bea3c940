//! Event publisher boundary.
//!
//! Repositories call [`EventSink::publish`] synchronously after a mutation
//! has been persisted. Delivery is best effort (at-most-once): a failing sink
//! is logged by the caller and never fails the mutation, so implementations
//! should return quickly and push slow transport work elsewhere.

use std::convert::Infallible;
use std::sync::Arc;

use crate::event::LifecycleEvent;

/// Destination for lifecycle events (message bus, log, test probe, ...).
pub trait EventSink: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, event: LifecycleEvent) -> Result<(), Self::Error>;
}

impl<S> EventSink for Arc<S>
where
    S: EventSink + ?Sized,
{
    type Error = S::Error;

    fn publish(&self, event: LifecycleEvent) -> Result<(), Self::Error> {
        (**self).publish(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopSink;

impl EventSink for NoopSink {
    type Error = Infallible;

    fn publish(&self, _event: LifecycleEvent) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Writes each event to the `tracing` pipeline.
///
/// Default sink for services running without a broker.
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    type Error = Infallible;

    fn publish(&self, event: LifecycleEvent) -> Result<(), Self::Error> {
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type(),
            entity_id = %event.subject.entity_id,
            tenant_id = ?event.subject.tenant_id.map(|t| t.get()),
            actor_user_id = ?event.subject.actor_user_id.map(|u| u.get()),
            changed_fields = ?event.changes.fields().collect::<Vec<_>>(),
            "business object lifecycle event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSubject, Operation};
    use bof_core::EntityId;
    use chrono::Utc;

    fn event() -> LifecycleEvent {
        LifecycleEvent::new(
            EventSubject {
                entity_type: "platform.module".to_string(),
                entity_id: EntityId::new(1),
                tenant_id: None,
                actor_user_id: None,
            },
            Operation::Created,
            None,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn builtin_sinks_never_fail() {
        assert!(NoopSink.publish(event()).is_ok());
        assert!(TracingSink.publish(event()).is_ok());
        assert!(Arc::new(NoopSink).publish(event()).is_ok());
    }
}
