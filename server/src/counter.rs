//! # Counter Store
//!
//! Durable mapping from a log category to the last issued sequence value.
//!
//! ## Redis
//!
//! - One hash, `log_numbers`, field per category, value is the last issued integer
//! - `HINCRBY` creates the field at 0 and increments it in a single atomic step, so lazy creation
//!   and increment never race between two first-time callers
//! - Redis queues commands, concurrent handlers for the same category always observe distinct values
//!
//! ## Seeded Numbers
//!
//! Records loaded with an existing number raise the counter through [`CounterStore::raise_to`], a
//! `max(current, floor)` Lua script, so later increments continue past them.
//!
//! ## Failure
//!
//! Any error is surfaced as [`StoreUnavailable`]. Bounding the wait is left to the caller.
use std::{
    collections::HashMap,
    fmt::{self, Display},
    str::FromStr,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, Script, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOG_NUMBERS_KEY: &str = "log_numbers";

const RAISE_SCRIPT: &str = r#"
local current = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0')
local floor = tonumber(ARGV[2])
if floor > current then
    redis.call('HSET', KEYS[1], ARGV[1], floor)
    return floor
end
return current
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Exception,
    Returns,
}

impl LogCategory {
    pub const ALL: [LogCategory; 2] = [LogCategory::Exception, LogCategory::Returns];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Exception => "exception",
            LogCategory::Returns => "returns",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogCategory::Exception => "EXC",
            LogCategory::Returns => "RET",
        }
    }
}

impl Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown log category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for LogCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Counter store unavailable: {0}")]
pub struct StoreUnavailable(pub String);

impl StoreUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<RedisError> for StoreUnavailable {
    fn from(error: RedisError) -> Self {
        Self(error.to_string())
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically advances the counter for `category` and returns the new value.
    async fn increment_and_get(&self, category: LogCategory) -> Result<u64, StoreUnavailable>;

    /// Atomically lifts the counter to at least `floor`, never lowers it. Returns the resulting value.
    async fn raise_to(&self, category: LogCategory, floor: u64) -> Result<u64, StoreUnavailable>;
}

fn to_sequence(category: LogCategory, value: i64) -> Result<u64, StoreUnavailable> {
    u64::try_from(value)
        .map_err(|_| StoreUnavailable::new(format!("counter {category} holds {value}")))
}

pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_and_get(&self, category: LogCategory) -> Result<u64, StoreUnavailable> {
        let mut connection = self.connection.clone();
        let value: i64 = connection
            .hincr(LOG_NUMBERS_KEY, category.as_str(), 1)
            .await?;

        to_sequence(category, value)
    }

    async fn raise_to(&self, category: LogCategory, floor: u64) -> Result<u64, StoreUnavailable> {
        let mut connection = self.connection.clone();
        let value: i64 = Script::new(RAISE_SCRIPT)
            .key(LOG_NUMBERS_KEY)
            .arg(category.as_str())
            .arg(floor)
            .invoke_async(&mut connection)
            .await?;

        to_sequence(category, value)
    }
}

/// Process-local counters, used by the `memory` backend and tests.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<LogCategory, u64>>,
    unavailable: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_available(&self) -> Result<(), StoreUnavailable> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreUnavailable::new("memory counter store offline"));
        }
        Ok(())
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn current(&self, category: LogCategory) -> Option<u64> {
        self.counters
            .lock()
            .ok()
            .and_then(|counters| counters.get(&category).copied())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_and_get(&self, category: LogCategory) -> Result<u64, StoreUnavailable> {
        self.check_available()?;
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreUnavailable::new("memory counter store poisoned"))?;

        let value = counters.entry(category).or_insert(0);
        *value += 1;

        Ok(*value)
    }

    async fn raise_to(&self, category: LogCategory, floor: u64) -> Result<u64, StoreUnavailable> {
        self.check_available()?;
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreUnavailable::new("memory counter store poisoned"))?;

        let value = counters.entry(category).or_insert(0);
        *value = (*value).max(floor);

        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("exception".parse::<LogCategory>(), Ok(LogCategory::Exception));
        assert_eq!("returns".parse::<LogCategory>(), Ok(LogCategory::Returns));
        assert_eq!(
            "Exception".parse::<LogCategory>(),
            Err(UnknownCategory("Exception".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fresh_category_starts_at_one() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.current(LogCategory::Exception), None);
        assert_eq!(store.increment_and_get(LogCategory::Exception).await, Ok(1));
        assert_eq!(store.increment_and_get(LogCategory::Exception).await, Ok(2));
        assert_eq!(store.current(LogCategory::Exception), Some(2));
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment_and_get(LogCategory::Exception).await, Ok(1));
        assert_eq!(store.increment_and_get(LogCategory::Returns).await, Ok(1));
        assert_eq!(store.increment_and_get(LogCategory::Exception).await, Ok(2));
        assert_eq!(store.increment_and_get(LogCategory::Returns).await, Ok(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_have_no_gaps() {
        let store = Arc::new(MemoryCounterStore::new());

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_and_get(LogCategory::Exception).await })
            })
            .collect();

        let mut values = HashSet::new();
        for handle in handles {
            values.insert(handle.await.unwrap().unwrap());
        }

        assert_eq!(values, (1..=200).collect::<HashSet<u64>>());
    }

    #[tokio::test]
    async fn test_raise_never_lowers() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.raise_to(LogCategory::Exception, 7).await, Ok(7));
        assert_eq!(store.raise_to(LogCategory::Exception, 3).await, Ok(7));
        assert_eq!(store.increment_and_get(LogCategory::Exception).await, Ok(8));
        assert_eq!(store.current(LogCategory::Returns), None);
    }

    #[tokio::test]
    async fn test_unavailable_does_not_advance() {
        let store = MemoryCounterStore::new();
        store.increment_and_get(LogCategory::Exception).await.unwrap();

        store.set_available(false);
        assert!(store.increment_and_get(LogCategory::Exception).await.is_err());

        store.set_available(true);
        assert_eq!(store.increment_and_get(LogCategory::Exception).await, Ok(2));
    }
}
