//! Redis-compatible KV cache operations.
//!
//! Holds the LLM response cache, the genesis cache, and mirrored
//! projection keys. Key patterns:
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `llm-cache:{policyType}:{hash}` | JSON | Cached decide() response |
//! | `genesis-cache:{policyType}:{hash}` | JSON | Cached genesis roster |
//! | `projection:recent-events` | JSON | Mirrored recent-events list |
//! | `projection:world-snapshot` | JSON | Mirrored world snapshot |
//!
//! All cache keys carry TTLs (7 days by default for LLM responses). The
//! cache is never the source of truth; on world reset it is flushed
//! before the store re-initializes.

use fred::prelude::*;
use fred::types::Expiration;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DbError;

/// Default TTL for cached LLM responses: 7 days.
pub const DEFAULT_RESPONSE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Key prefix for the LLM response cache.
pub const LLM_CACHE_PREFIX: &str = "llm-cache";

/// Default key prefix for the genesis cache (configurable via
/// `GENESIS_CACHE_PREFIX`).
pub const GENESIS_CACHE_PREFIX: &str = "genesis-cache";

/// Build an LLM response cache key.
pub fn llm_cache_key(policy_type: &str, fingerprint: &str) -> String {
    format!("{LLM_CACHE_PREFIX}:{policy_type}:{fingerprint}")
}

/// Build a genesis cache key under a configurable prefix.
pub fn genesis_cache_key(prefix: &str, policy_type: &str, hash: &str) -> String {
    format!("{prefix}:{policy_type}:{hash}")
}

/// Connection handle to a Redis-compatible instance.
#[derive(Clone)]
pub struct KvCache {
    client: Client,
}

impl KvCache {
    /// Connect to the KV store at the given URL (`redis://host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed and
    /// [`DbError::Kv`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config =
            Config::from_url(url).map_err(|e| DbError::Config(format!("Invalid KV URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to KV cache");
        Ok(Self { client })
    }

    /// Serialize `value` as JSON and store it at `key` with a TTL.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] or [`DbError::Kv`].
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: i64,
    ) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self
            .client
            .set(
                key,
                json.as_str(),
                Some(Expiration::EX(ttl_seconds)),
                None,
                false,
            )
            .await?;
        Ok(())
    }

    /// Read the value at `key` and deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::KeyNotFound`] if the key does not exist,
    /// [`DbError::Serialization`] on bad JSON, or [`DbError::Kv`].
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value.map_or_else(
            || Err(DbError::KeyNotFound(key.to_owned())),
            |s| Ok(serde_json::from_str(&s)?),
        )
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Kv`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Flush every key.
    ///
    /// Used on world reset (the cache must clear before the store
    /// re-initializes) and in tests.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Kv`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}
