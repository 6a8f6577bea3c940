//! Infrastructure-backed event sinks.
//!
//! The `EventSink` abstraction and the in-process implementations live in
//! `bof-events`. This module provides transports that need external services.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisEventSink, RedisSinkError};
