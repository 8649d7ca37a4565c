// SQLite-backed trust store.
//
// Tables:
// - trust_records: one row per (chat_id, user_id) with the trusted flag
//
// Every write is a single INSERT ... ON CONFLICT statement, so SQLite itself
// keeps same-key upserts atomic.

use crate::core::moderation::{StoreError, TrustStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

pub struct SqliteTrustStore {
    pool: Pool<Sqlite>,
}

impl SqliteTrustStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and migrate it.
    ///
    /// Accepts `sqlite://path`, `sqlite::memory:` or a bare file path.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // Each connection to :memory: is its own database, so keep exactly one.
        let in_memory = conn_str.contains(":memory:");
        if !in_memory {
            let path_str = conn_str
                .trim_start_matches("sqlite://")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(path_str).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&conn_str)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { MAX_CONNECTIONS })
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trust_records (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                trusted BOOLEAN NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl TrustStore for SqliteTrustStore {
    async fn get(&self, chat_id: u64, user_id: u64) -> Result<bool, StoreError> {
        let row =
            sqlx::query("SELECT trusted FROM trust_records WHERE chat_id = ? AND user_id = ?")
                .bind(chat_id as i64)
                .bind(user_id as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<bool, _>("trusted")
                .map_err(|e| StoreError::Storage(e.to_string())),
            None => Ok(false),
        }
    }

    async fn set(&self, chat_id: u64, user_id: u64, trusted: bool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trust_records (chat_id, user_id, trusted, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(chat_id, user_id) DO UPDATE SET
                trusted = excluded.trusted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(chat_id as i64)
        .bind(user_id as i64)
        .bind(trusted)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteTrustStore {
        SqliteTrustStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_record_is_untrusted() {
        let store = memory_store().await;

        assert!(!store.get(10, 20).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_single_row() {
        let store = memory_store().await;

        store.set(10, 20, true).await.unwrap();
        assert!(store.get(10, 20).await.unwrap());

        store.set(10, 20, false).await.unwrap();
        assert!(!store.get(10, 20).await.unwrap());

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM trust_records")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = memory_store().await;

        store.set(10, 20, true).await.unwrap();

        assert!(!store.get(20, 10).await.unwrap());
        assert!(!store.get(10, 21).await.unwrap());
        assert!(!store.get(11, 20).await.unwrap());
    }

    #[tokio::test]
    async fn test_large_ids_round_trip() {
        let store = memory_store().await;
        // Discord snowflakes use the full u64 range
        let chat = 1_432_001_978_447_167_611u64;
        let user = u64::MAX;

        store.set(chat, user, true).await.unwrap();

        assert!(store.get(chat, user).await.unwrap());
        assert!(!store.get(chat, user - 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_undecodable_row_is_storage_error() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO trust_records (chat_id, user_id, trusted, updated_at) VALUES (1, 2, 'maybe', 'now')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store.get(1, 2).await;

        assert!(matches!(result, Err(StoreError::Storage(_))));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = memory_store().await;
        store.set(1, 1, true).await.unwrap();

        store.migrate().await.unwrap();

        assert!(store.get(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_trust_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trust.db");
        let url = format!("sqlite://{}", path.display());

        {
            let store = SqliteTrustStore::connect(&url).await.unwrap();
            store.set(5, 6, true).await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteTrustStore::connect(&url).await.unwrap();
        assert!(reopened.get(5, 6).await.unwrap());
        assert!(!reopened.get(5, 7).await.unwrap());
    }
}
