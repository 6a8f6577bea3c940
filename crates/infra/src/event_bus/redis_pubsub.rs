//! Redis pub/sub lifecycle event sink (optional).
//!
//! Note: Redis pub/sub is not durable (messages are dropped if subscribers
//! are offline). That matches the at-most-once contract of [`EventSink`].
//!
//! `publish` only hands the event to a background thread; serialization and
//! the network round trip happen there, so a slow or unreachable broker
//! never delays the repository call that produced the event.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use tracing::{debug, warn};

use bof_events::{EventSink, LifecycleEvent, Subscription};

#[derive(Debug)]
pub enum RedisSinkError {
    Redis(String),
    /// The background publisher thread could not start or has exited.
    WorkerStopped,
}

/// Publishes lifecycle events as JSON on a Redis channel.
#[derive(Debug)]
pub struct RedisEventSink {
    client: redis::Client,
    channel: String,
    tx: mpsc::Sender<LifecycleEvent>,
}

impl RedisEventSink {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, RedisSinkError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| RedisSinkError::Redis(e.to_string()))?;
        let channel = channel.into();

        let (tx, rx) = mpsc::channel();
        let worker_client = client.clone();
        let worker_channel = channel.clone();
        thread::Builder::new()
            .name("bof-redis-sink".to_string())
            .spawn(move || publish_loop(worker_client, worker_channel, rx))
            .map_err(|_| RedisSinkError::WorkerStopped)?;

        Ok(Self { client, channel, tx })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive events published on the channel (by any process).
    pub fn subscribe(&self) -> Subscription<LifecycleEvent> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(err) => {
                    warn!(error = %err, "redis subscription could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if pubsub.subscribe(&channel).is_err() {
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let event: LifecycleEvent = match serde_json::from_str(&payload) {
                    Ok(e) => e,
                    Err(err) => {
                        debug!(error = %err, "skipping non-event payload");
                        continue;
                    }
                };

                if tx.send(event).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

impl EventSink for RedisEventSink {
    type Error = RedisSinkError;

    fn publish(&self, event: LifecycleEvent) -> Result<(), Self::Error> {
        self.tx.send(event).map_err(|_| RedisSinkError::WorkerStopped)
    }
}

/// Runs until the sink is dropped. Reconnects lazily after a failure; the
/// event that hit the failure is dropped.
fn publish_loop(client: redis::Client, channel: String, rx: mpsc::Receiver<LifecycleEvent>) {
    let mut conn: Option<redis::Connection> = None;

    for event in rx {
        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(err) => {
                warn!(event_id = %event.event_id, error = %err, "failed to serialize lifecycle event");
                continue;
            }
        };

        if conn.is_none() {
            match client.get_connection() {
                Ok(c) => conn = Some(c),
                Err(err) => {
                    warn!(event_id = %event.event_id, error = %err, "redis unavailable; lifecycle event dropped");
                    continue;
                }
            }
        }

        if let Some(c) = conn.as_mut() {
            let result: redis::RedisResult<i64> = c.publish(&channel, payload);
            if let Err(err) = result {
                warn!(event_id = %event.event_id, error = %err, "redis publish failed; lifecycle event dropped");
                conn = None;
            }
        }
    }
}
