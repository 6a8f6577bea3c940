//! Lifecycle events and the publisher boundary.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod sink;

pub use bus::Subscription;
pub use event::{EventSubject, LifecycleEvent, Operation};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use sink::{EventSink, NoopSink, TracingSink};
