//! SQLite-backed [`KvStore`] adapter: a local surrogate for the external KV
//! service, following the reference architecture's own SQLite repository
//! pattern (raw `sqlx::query` over a flat table, no ORM).

use std::collections::HashMap;

use async_trait::async_trait;
use meta_core_domain::repositories::KvStore;
use meta_core_domain::value_objects::HashId;
use meta_core_domain::CoreError;
use sqlx::{Row, SqlitePool};

pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub async fn from_file(database_path: &str) -> Result<Self, CoreError> {
        let pool = SqlitePool::connect(database_path)
            .await
            .map_err(|e| CoreError::persistence_error(format!("connect {database_path}: {e}")))?;
        let store = Self { pool };
        store.ensure_table_exists().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePool::connect(":memory:")
            .await
            .map_err(|e| CoreError::persistence_error(format!("connect in-memory sqlite: {e}")))?;
        let store = Self { pool };
        store.ensure_table_exists().await?;
        Ok(store)
    }

    async fn ensure_table_exists(&self) -> Result<(), CoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS hash_metadata (
                hash_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (hash_id, key)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::persistence_error(format!("create hash_metadata table: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn put_fields(&self, hash_id: &HashId, fields: HashMap<String, String>) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::persistence_error(e.to_string()))?;
        for (key, value) in fields {
            sqlx::query(
                "INSERT INTO hash_metadata (hash_id, key, value) VALUES (?, ?, ?)
                 ON CONFLICT(hash_id, key) DO UPDATE SET value = excluded.value",
            )
            .bind(hash_id.as_str())
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::persistence_error(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| CoreError::persistence_error(e.to_string()))
    }

    async fn get_fields(&self, hash_id: &HashId) -> Result<HashMap<String, String>, CoreError> {
        let rows = sqlx::query("SELECT key, value FROM hash_metadata WHERE hash_id = ?")
            .bind(hash_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::persistence_error(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("key"), row.get::<String, _>("value")))
            .collect())
    }

    async fn remove(&self, hash_id: &HashId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM hash_metadata WHERE hash_id = ?")
            .bind(hash_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::persistence_error(e.to_string()))?;
        Ok(())
    }

    async fn list_hash_ids(&self) -> Result<Vec<HashId>, CoreError> {
        let rows = sqlx::query("SELECT DISTINCT hash_id FROM hash_metadata")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::persistence_error(e.to_string()))?;
        rows.into_iter().map(|row| HashId::from_hex(row.get::<String, _>("hash_id"))).collect()
    }
}
