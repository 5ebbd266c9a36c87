//! Response cache: answers keyed by normalized message text, with TTL.
//!
//! Two backends behind one capability trait:
//!
//! - **memory** (default): a sharded concurrent map. Per-key atomicity
//!   with no global lock; entries vanish on restart.
//! - **sqlite**: persistent through the shared connection pool (WAL);
//!   answers survive restarts.
//!
//! Both evict lazily: an expired entry is treated as absent by `get` and
//! removed on the spot. Absences are never cached.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::db;

/// Key-value store for previously computed answers.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up a non-expired answer. Expired entries are evicted and
    /// reported as absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store an answer under `key` for `ttl`.
    async fn put(&self, key: &str, text: &str, ttl: Duration) -> Result<()>;
}

// ============ Memory backend ============

struct MemoryEntry {
    text: String,
    expires_at: Instant,
}

/// In-process cache over a sharded concurrent map.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.text.clone()));
            }
        } else {
            return Ok(None);
        }

        // Expired: evict outside the read guard.
        self.entries.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, text: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                text: text.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

// ============ SQLite backend ============

/// Persistent cache backed by SQLite.
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Connect and create the schema if missing.
    pub async fn new(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS answers (
                key TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                ttl_secs INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ResponseCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT text, created_at, ttl_secs FROM answers WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let created_at: i64 = row.get("created_at");
        let ttl_secs: i64 = row.get("ttl_secs");

        if Utc::now().timestamp() >= created_at + ttl_secs {
            sqlx::query("DELETE FROM answers WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        Ok(Some(row.get("text")))
    }

    async fn put(&self, key: &str, text: &str, ttl: Duration) -> Result<()> {
        sqlx::query(
            "INSERT INTO answers (key, text, created_at, ttl_secs)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                text = excluded.text,
                created_at = excluded.created_at,
                ttl_secs = excluded.ttl_secs",
        )
        .bind(key)
        .bind(text)
        .bind(Utc::now().timestamp())
        .bind(ttl.as_secs() as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Create the configured cache backend.
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<dyn ResponseCache>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryCache::new())),
        "sqlite" => Ok(Arc::new(SqliteCache::new(&config.path).await?)),
        other => anyhow::bail!("Unknown cache backend: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_roundtrip() {
        let cache = MemoryCache::new();
        cache
            .put("faq:opening hours", "9am to 5pm", Duration::from_secs(60))
            .await
            .unwrap();

        let hit = cache.get("faq:opening hours").await.unwrap();
        assert_eq!(hit.as_deref(), Some("9am to 5pm"));
        assert!(cache.get("faq:other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_expired_entry_is_absent() {
        let cache = MemoryCache::new();
        cache
            .put("faq:q", "stale", Duration::from_secs(0))
            .await
            .unwrap();

        assert!(cache.get("faq:q").await.unwrap().is_none());
        // Evicted, not just hidden.
        assert!(cache.entries.get("faq:q").is_none());
    }

    #[tokio::test]
    async fn memory_put_overwrites() {
        let cache = MemoryCache::new();
        cache
            .put("faq:q", "old", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .put("faq:q", "new", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("faq:q").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn sqlite_roundtrip_and_expiry() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = SqliteCache::new(&tmp.path().join("answers.sqlite"))
            .await
            .unwrap();

        cache
            .put("faq:address", "12 Main St", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get("faq:address").await.unwrap().as_deref(),
            Some("12 Main St")
        );

        cache
            .put("faq:stale", "gone", Duration::from_secs(0))
            .await
            .unwrap();
        assert!(cache.get("faq:stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_survives_reconnect() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("answers.sqlite");

        {
            let cache = SqliteCache::new(&path).await.unwrap();
            cache
                .put("faq:q", "persisted", Duration::from_secs(60))
                .await
                .unwrap();
        }

        let cache = SqliteCache::new(&path).await.unwrap();
        assert_eq!(
            cache.get("faq:q").await.unwrap().as_deref(),
            Some("persisted")
        );
    }
}
