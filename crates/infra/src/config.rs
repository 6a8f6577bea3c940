//! Configuration loading from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `USE_PERSISTENT_STORES` | `false` | Postgres stores instead of in-memory |
//! | `DATABASE_URL` | none | required when persistent stores are on |
//! | `DATABASE_MAX_CONNECTIONS` | `10` | pool size |
//! | `REDIS_URL` | `redis://localhost:6379` | event transport (feature `redis`) |
//! | `BOF_EVENT_CHANNEL` | `bof.lifecycle` | pub/sub channel for lifecycle events |
//! | `BOF_MAX_PAGE_SIZE` | `1000` | upper bound applied to every page request |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use bof_core::page::MAX_PAGE_SIZE;
use bof_core::BusinessObject;
use bof_events::EventSink;

use crate::repository::Repository;
use crate::store::{postgres, EntityStore, StoreError};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_EVENT_CHANNEL: &str = "bof.lifecycle";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Which store implementation services should wire up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String, max_connections: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub event_channel: String,
    pub max_page_size: u64,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            event_channel: DEFAULT_EVENT_CHANNEL.to_string(),
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let use_persistent_stores = lookup("USE_PERSISTENT_STORES")
            .map(|v| v.trim().parse::<bool>().unwrap_or(false))
            .unwrap_or(false);

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => parse_positive("DATABASE_MAX_CONNECTIONS", &raw)?,
            None => defaults.database_max_connections,
        };

        let max_page_size = match lookup("BOF_MAX_PAGE_SIZE") {
            Some(raw) => {
                let value: u64 = parse_positive("BOF_MAX_PAGE_SIZE", &raw)?;
                if value > MAX_PAGE_SIZE {
                    return Err(ConfigError::Invalid {
                        key: "BOF_MAX_PAGE_SIZE",
                        value: raw,
                    });
                }
                value
            }
            None => defaults.max_page_size,
        };

        Ok(Self {
            use_persistent_stores,
            database_url,
            database_max_connections,
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            event_channel: lookup("BOF_EVENT_CHANNEL").unwrap_or(defaults.event_channel),
            max_page_size,
        })
    }

    pub fn store_backend(&self) -> StoreBackend {
        match (&self.database_url, self.use_persistent_stores) {
            (Some(url), true) => StoreBackend::Postgres {
                database_url: url.clone(),
                max_connections: self.database_max_connections,
            },
            _ => StoreBackend::InMemory,
        }
    }

    /// Repository over `store` with this configuration's page cap.
    pub fn repository<E, S, P>(&self, store: S, sink: P) -> Repository<E, S, P>
    where
        E: BusinessObject,
        S: EntityStore<E>,
        P: EventSink,
    {
        Repository::new(store, sink).with_max_page_size(self.max_page_size)
    }

    /// Connection pool for the Postgres backend; `None` when stores are
    /// in-memory. The pool is shared by every `PostgresEntityStore`.
    pub async fn postgres_pool(&self) -> Result<Option<Arc<PgPool>>, StoreError> {
        match self.store_backend() {
            StoreBackend::InMemory => Ok(None),
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => Ok(Some(Arc::new(postgres::connect(&database_url, max_connections).await?))),
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis_sink(&self) -> Result<crate::event_bus::RedisEventSink, crate::event_bus::RedisSinkError> {
        crate::event_bus::RedisEventSink::new(&self.redis_url, self.event_channel.clone())
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}
