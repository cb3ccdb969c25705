//! services/studio/src/adapters/local_cache.rs
//!
//! This module contains the local cache adapter, the concrete implementation of
//! the `LocalCacheService` port. It keeps string values under string keys in a
//! single SQLite table so drafts survive restarts of the studio.

use async_trait::async_trait;
use chrono::Utc;
use curriculum_core::ports::{LocalCacheService, PortError, PortResult};
use sqlx::SqlitePool;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite-backed key/value store that implements the `LocalCacheService` port.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Creates a new `SqliteCache`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run the cache migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_error(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl LocalCacheService for SqliteCache {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM local_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO local_cache (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM local_cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
