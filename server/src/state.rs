use std::sync::Arc;

use tracing::info;

use super::{
    auth::TokenSigner,
    config::{Backend, Config},
    counter::{CounterStore, MemoryCounterStore, RedisCounterStore},
    database::init_redis,
    documents::{DocumentStore, MemoryDocumentStore, RedisDocumentStore},
    log_number::LogNumberIssuer,
    upload::{CloudinaryStorage, ObjectStorage},
};

pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub issuer: LogNumberIssuer,
    pub tokens: TokenSigner,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub async fn new(config: &Config) -> Arc<Self> {
        let (documents, counters): (Arc<dyn DocumentStore>, Arc<dyn CounterStore>) =
            match config.backend {
                Backend::Redis => {
                    let connection = init_redis(&config.redis_url)
                        .await
                        .expect("Redis misconfigured!");
                    info!("Connected to Redis at {}", config.redis_url);

                    (
                        Arc::new(RedisDocumentStore::new(connection.clone())),
                        Arc::new(RedisCounterStore::new(connection)),
                    )
                }
                Backend::Memory => {
                    info!("Using in-memory stores, data will not survive a restart");

                    (
                        Arc::new(MemoryDocumentStore::new()),
                        Arc::new(MemoryCounterStore::new()),
                    )
                }
            };

        Self::from_parts(
            documents,
            counters,
            TokenSigner::new(&config.token_secret),
            Arc::new(CloudinaryStorage::new(config.cloudinary.clone())),
        )
    }

    pub fn from_parts(
        documents: Arc<dyn DocumentStore>,
        counters: Arc<dyn CounterStore>,
        tokens: TokenSigner,
        storage: Arc<dyn ObjectStorage>,
    ) -> Arc<Self> {
        Arc::new(Self {
            documents,
            issuer: LogNumberIssuer::new(counters),
            tokens,
            storage,
        })
    }
}
