//! Command implementations

pub mod config;
pub mod doctor;
pub mod query;
pub mod subject;
pub mod tags;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use taggable_adapters::events::TracingEventSink;
use taggable_adapters::store::SqliteTagStore;
use taggable_domain::{EventEmitter, FieldPolicy, SystemClock, TagService, Taggable};

use crate::config::AppConfig;

/// Loaded configuration plus an opened store
pub struct Workspace {
    pub config: AppConfig,
    pub store: Arc<SqliteTagStore>,
}

impl Workspace {
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let store = SqliteTagStore::new(&config.general.database_path, &config.tagging)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database: {}",
                    config.general.database_path.display()
                )
            })?;

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    fn emitter(&self) -> EventEmitter {
        EventEmitter::new(Arc::new(TracingEventSink), Arc::new(SystemClock))
    }

    pub fn engine(&self) -> Taggable<SqliteTagStore> {
        Taggable::new(
            Arc::clone(&self.store),
            self.emitter(),
            self.config.tagging.clone(),
            self.config.registry(),
        )
    }

    pub fn service(&self) -> TagService<SqliteTagStore> {
        TagService::new(
            Arc::clone(&self.store),
            self.emitter(),
            &self.config.tagging,
            FieldPolicy::default(),
        )
        .with_registry(self.config.registry())
    }
}
