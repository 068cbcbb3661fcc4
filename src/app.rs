//! Shared handles used by every command and HTTP handler.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::llm::LlmClient;
use crate::migrate;
use crate::storage::{FsObjectStore, ObjectStore};

/// Configuration plus the database pool, blob store and LLM client.
///
/// Cheap to clone; all fields are reference counted.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub store: Arc<dyn ObjectStore>,
    pub llm: LlmClient,
}

impl App {
    /// Connect to the database (creating the schema if needed) and set up
    /// the filesystem blob store and LLM client from `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::create_schema(&pool).await?;
        let store = Arc::new(FsObjectStore::new(config.storage.root.clone()));
        let llm = LlmClient::from_config(&config.llm)?;
        Ok(Self::with_parts(config.clone(), pool, store, llm))
    }

    pub fn with_parts(
        config: Config,
        pool: SqlitePool,
        store: Arc<dyn ObjectStore>,
        llm: LlmClient,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            store,
            llm,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
