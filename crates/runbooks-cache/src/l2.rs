//! Optional remote L2 tier backed by `redis`, grounded on `harborgrid-justin-caddy`'s
//! use of `redis = { features = ["tokio-comp", "connection-manager"] }`.
//! Every round-trip goes through a dedicated [`CircuitBreakerRegistry`] so
//! sustained L2 failure opens the breaker and [`crate::TwoTierCache`] falls
//! back to L1-only without the caller ever seeing an L2 error.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use runbooks_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry};
use std::time::Duration;

const BREAKER_NAME: &str = "cache-l2";

pub(crate) struct L2Client {
    manager: ConnectionManager,
    breaker: CircuitBreakerRegistry,
    breaker_config: CircuitBreakerConfig,
}

impl L2Client {
    pub(crate) async fn connect(
        url: &str,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager,
            breaker: CircuitBreakerRegistry::new(),
            breaker_config,
        })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.breaker.state(BREAKER_NAME) == runbooks_circuitbreaker::CircuitState::Open
    }

    pub(crate) async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.manager.clone();
        let result = self
            .breaker
            .call(BREAKER_NAME, &self.breaker_config, || async move {
                conn.get::<_, Option<String>>(key).await
            })
            .await;

        match result {
            Ok(value) => value,
            Err(CircuitBreakerError::Open { .. }) => None,
            Err(CircuitBreakerError::Inner(err)) => {
                tracing::warn!(error = %err, "L2 cache get failed");
                None
            }
        }
    }

    /// Fire-and-forget: the caller never awaits an error out of this. Any
    /// failure only opens the breaker, which the next call observes.
    pub(crate) async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let mut conn = self.manager.clone();
        let key = key.to_string();
        let value = value.to_string();
        let ttl_secs = ttl.as_secs().max(1);
        let result = self
            .breaker
            .call(BREAKER_NAME, &self.breaker_config, || async move {
                conn.set_ex::<_, _, ()>(key, value, ttl_secs).await
            })
            .await;

        if let Err(err) = result {
            tracing::warn!(error = %err, "L2 cache set failed");
        }
    }

    pub(crate) async fn delete(&self, key: &str) {
        let mut conn = self.manager.clone();
        let key = key.to_string();
        let result = self
            .breaker
            .call(BREAKER_NAME, &self.breaker_config, || async move {
                conn.del::<_, ()>(key).await
            })
            .await;

        if let Err(err) = result {
            tracing::warn!(error = %err, "L2 cache delete failed");
        }
    }

    /// Scans and deletes every key with the given prefix. Uses `SCAN` rather
    /// than `KEYS` so a large keyspace doesn't block the shared redis server.
    pub(crate) async fn delete_prefix(&self, prefix: &str) -> usize {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        let result = self
            .breaker
            .call(BREAKER_NAME, &self.breaker_config, || async move {
                let mut cursor = 0u64;
                let mut deleted = 0usize;
                loop {
                    let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(200)
                        .query_async(&mut conn)
                        .await?;
                    if !keys.is_empty() {
                        deleted += keys.len();
                        conn.del::<_, ()>(keys).await?;
                    }
                    cursor = next_cursor;
                    if cursor == 0 {
                        break;
                    }
                }
                Ok::<usize, redis::RedisError>(deleted)
            })
            .await;

        match result {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "L2 cache prefix delete failed");
                0
            }
        }
    }
}
