// src/store.rs
// Option/transient storage (Redis or In-Memory) and the typed sandbox test record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY/VALUE STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Stores a value that disappears after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Picks Redis when a URL is configured and the client opens, in-memory otherwise.
pub fn store_from_url(redis_url: Option<&str>) -> Arc<dyn KeyValueStore> {
    let client = redis_url.and_then(|url| {
        redis::Client::open(url)
            .map_err(|e| tracing::error!("[STORE] ❌ Redis connect error: {}", e))
            .ok()
    });

    match client {
        Some(client) => {
            tracing::info!("[STORE] Using Redis option store");
            Arc::new(RedisStore::new(client))
        }
        None => {
            tracing::info!("[STORE] Using in-memory option store");
            Arc::new(MemoryStore::new())
        }
    }
}

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection().await?;
        Ok(con.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = con.set(key, value).await?;
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = con.del(key).await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct MemoryEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let store = self.entries.read().await;
        Ok(store.get(key).and_then(|entry| match entry.expires_at {
            Some(expiry) if expiry <= Utc::now() => None,
            _ => Some(entry.value.clone()),
        }))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut store = self.entries.write().await;
        store.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        let mut store = self.entries.write().await;
        store.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Utc::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut store = self.entries.write().await;
        store.remove(key);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SANDBOX TEST RECORD
// ═══════════════════════════════════════════════════════════════════════════════

pub const TOKEN_KEY: &str = "paypal_sandbox_test_token";
pub const RESULT_KEY: &str = "paypal_sandbox_test";
pub const COMPLETED_AT_KEY: &str = "paypal_sandbox_test_completed_at";
pub const NOTICE_KEY: &str = "paypal-sandbox-test_notice";
pub const UPGRADE_NOTICE_KEY: &str = "release-143-paypal_notice";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Succeeded,
    Failed,
}

impl TestResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Succeeded => "succeeded",
            TestResult::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(TestResult::Succeeded),
            "failed" => Some(TestResult::Failed),
            _ => None,
        }
    }
}

/// Typed access to the keys one sandbox test run reads and writes.
///
/// Only one test is outstanding at a time: issuing a token replaces any
/// earlier one.
#[derive(Clone)]
pub struct SandboxTestStore {
    kv: Arc<dyn KeyValueStore>,
    prefix: String,
    notice_ttl: Option<Duration>,
}

impl SandboxTestStore {
    /// `notice_ttl` of `None` keeps the result notice until it is displayed.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
        notice_ttl: Option<Duration>,
    ) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
            notice_ttl,
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub async fn save_token(&self, token: &str) -> Result<(), StoreError> {
        self.kv.set(&self.key(TOKEN_KEY), token).await
    }

    pub async fn token(&self) -> Result<Option<String>, StoreError> {
        self.kv.get(&self.key(TOKEN_KEY)).await
    }

    pub async fn clear_token(&self) -> Result<(), StoreError> {
        self.kv.delete(&self.key(TOKEN_KEY)).await
    }

    pub async fn save_result(&self, result: TestResult, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.kv.set(&self.key(RESULT_KEY), result.as_str()).await?;
        self.kv
            .set(&self.key(COMPLETED_AT_KEY), &at.to_rfc3339())
            .await
    }

    pub async fn result(&self) -> Result<Option<TestResult>, StoreError> {
        let raw = self.kv.get(&self.key(RESULT_KEY)).await?;
        Ok(raw.as_deref().and_then(TestResult::parse))
    }

    pub async fn completed_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw = self.kv.get(&self.key(COMPLETED_AT_KEY)).await?;
        Ok(raw
            .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
            .map(|at| at.with_timezone(&Utc)))
    }

    pub async fn flag_notice(&self) -> Result<(), StoreError> {
        let key = self.key(NOTICE_KEY);
        match self.notice_ttl {
            Some(ttl) => self.kv.set_with_ttl(&key, "1", ttl).await,
            None => self.kv.set(&key, "1").await,
        }
    }

    /// Returns whether the notice marker was set, clearing it.
    pub async fn take_notice(&self) -> Result<bool, StoreError> {
        let key = self.key(NOTICE_KEY);
        let flagged = self.kv.get(&key).await?.is_some();
        if flagged {
            self.kv.delete(&key).await?;
        }
        Ok(flagged)
    }

    pub async fn clear_upgrade_notice(&self) -> Result<(), StoreError> {
        self.kv.delete(&self.key(UPGRADE_NOTICE_KEY)).await
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }
}
