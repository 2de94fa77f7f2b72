use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One cached access credential per user. `expires_at` (epoch seconds) is
/// the authoritative expiry; the cache entry's own TTL is always shorter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCredential {
    pub access_token: String,
    pub expires_at: i64,
    /// Raw provider payload from the token endpoint, kept opaque.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl CachedCredential {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Key/value store holding at most one credential per user id, with a TTL.
/// Backends must tolerate concurrent access; callers treat errors as misses.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<CachedCredential>>;
    async fn put(&self, user_id: i64, credential: &CachedCredential, ttl_secs: i64) -> Result<()>;
    async fn invalidate(&self, user_id: i64) -> Result<()>;
}

/// SQLite-backed cache. Connections are opened per operation on a blocking
/// thread; TTL eviction happens lazily on read.
pub struct SqliteCredentialCache {
    db_path: PathBuf,
}

impl SqliteCredentialCache {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS spotify_token_cache (
                user_id INTEGER PRIMARY KEY,
                token_json TEXT NOT NULL,
                cache_expires_at INTEGER NOT NULL
            );",
        )?;
        Ok(conn)
    }
}

#[async_trait]
impl CredentialCache for SqliteCredentialCache {
    async fn get(&self, user_id: i64) -> Result<Option<CachedCredential>> {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<CachedCredential>> {
            let conn = Self::open(&path)?;
            let mut stmt = conn.prepare(
                "SELECT token_json, cache_expires_at FROM spotify_token_cache WHERE user_id = ?1",
            )?;
            let row = stmt
                .query_row(params![user_id], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
                })
                .optional()?;
            let now = Utc::now().timestamp();
            match row {
                Some((_, cache_expires_at)) if cache_expires_at <= now => {
                    conn.execute(
                        "DELETE FROM spotify_token_cache WHERE user_id = ?1",
                        params![user_id],
                    )?;
                    Ok(None)
                }
                Some((json, _)) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
        .await?
    }

    async fn put(&self, user_id: i64, credential: &CachedCredential, ttl_secs: i64) -> Result<()> {
        let path = self.db_path.clone();
        let json = serde_json::to_string(credential)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Self::open(&path)?;
            let cache_expires_at = Utc::now().timestamp() + ttl_secs;
            conn.execute(
                "INSERT INTO spotify_token_cache (user_id, token_json, cache_expires_at) VALUES (?1, ?2, ?3) ON CONFLICT(user_id) DO UPDATE SET token_json = excluded.token_json, cache_expires_at = excluded.cache_expires_at",
                params![user_id, json, cache_expires_at],
            )?;
            Ok(())
        })
        .await?
    }

    async fn invalidate(&self, user_id: i64) -> Result<()> {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Self::open(&path)?;
            conn.execute(
                "DELETE FROM spotify_token_cache WHERE user_id = ?1",
                params![user_id],
            )?;
            Ok(())
        })
        .await?
    }
}

/// In-process cache with the same TTL semantics. Used in tests and when no
/// cache DB path is configured.
#[derive(Default)]
pub struct MemoryCredentialCache {
    entries: Mutex<HashMap<i64, (CachedCredential, i64)>>,
}

impl MemoryCredentialCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialCache for MemoryCredentialCache {
    async fn get(&self, user_id: i64) -> Result<Option<CachedCredential>> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now().timestamp();
        match entries.get(&user_id) {
            Some((_, cache_expires_at)) if *cache_expires_at <= now => {
                entries.remove(&user_id);
                Ok(None)
            }
            Some((credential, _)) => Ok(Some(credential.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, user_id: i64, credential: &CachedCredential, ttl_secs: i64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let cache_expires_at = Utc::now().timestamp() + ttl_secs;
        entries.insert(user_id, (credential.clone(), cache_expires_at));
        Ok(())
    }

    async fn invalidate(&self, user_id: i64) -> Result<()> {
        self.entries.lock().await.remove(&user_id);
        Ok(())
    }
}
