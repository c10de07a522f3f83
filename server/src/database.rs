//! # Redis
//!
//! Single backing store for documents and log number counters.
//!
//! ## Keys
//!
//! - `docs:<collection>`: hash of `_id` to JSON document
//! - `log_numbers`: hash of log category to the last issued sequence value
//!
//! ## Atomicity
//!
//! Redis runs commands one at a time, so `HINCRBY` is the only primitive needed for gap free,
//! duplicate free log numbers. Nothing else relies on multi key transactions.
use std::time::Duration;

use redis::{
    Client,
    RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;

    client.get_connection_manager_with_config(config).await
}
