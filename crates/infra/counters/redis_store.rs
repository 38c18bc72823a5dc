use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use redis::{Script, aio::MultiplexedConnection};
use tokio::{sync::RwLock, time::timeout};
use tracing::{info, warn};

use crate::domain::{
    repositories::counter_store::CounterStore,
    value_objects::counters::{ClaimOutcome, WindowHit},
};

const KEY_PREFIX: &str = "repurpose";

/// Counter store shared by every instance through Redis.
pub struct RedisCounterStore {
    client: redis::Client,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    op_timeout: Duration,
    hit_window_script: Script,
    release_script: Script,
}

impl RedisCounterStore {
    /// Opening the client does not connect; the first operation does, and reconnects on failure.
    pub fn new(redis_url: &str, op_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;

        // INCR and PEXPIRE in one round trip so a window always gets an expiry.
        let hit_window_script = Script::new(
            r#"
            local count = redis.call('INCR', KEYS[1])
            if count == 1 then
                redis.call('PEXPIRE', KEYS[1], ARGV[1])
            end
            local ttl = redis.call('PTTL', KEYS[1])
            if ttl < 0 then
                redis.call('PEXPIRE', KEYS[1], ARGV[1])
                ttl = tonumber(ARGV[1])
            end
            return {count, ttl}
            "#,
        );

        // Only the current owner may delete a claim.
        let release_script = Script::new(
            r#"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('DEL', KEYS[1])
            end
            return 0
            "#,
        );

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            op_timeout,
            hit_window_script,
            release_script,
        })
    }

    fn namespaced(key: &str) -> String {
        format!("{KEY_PREFIX}:{key}")
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = timeout(
            self.op_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| anyhow!("redis connect timed out"))??;
        info!("counters: redis connection established");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn forget_connection(&self) {
        *self.connection.write().await = None;
    }

    /// Applies the per-operation timeout and drops the cached connection on failure.
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        match timeout(self.op_timeout, f(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(op, error = %err, "counters: redis command failed");
                self.forget_connection().await;
                Err(err.into())
            }
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "counters: redis command timed out"
                );
                self.forget_connection().await;
                Err(anyhow!("redis {op} timed out"))
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    // Redis rejects a zero PX/PEXPIRE.
    (duration.as_millis() as u64).max(1)
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit_window(&self, key: &str, window: Duration) -> Result<WindowHit> {
        let key = Self::namespaced(key);
        let window_ms = millis(window);

        let (count, ttl_ms): (i64, i64) = self
            .run("hit_window", |mut conn| async move {
                self.hit_window_script
                    .key(&key)
                    .arg(window_ms)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        Ok(WindowHit {
            count: u64::try_from(count).unwrap_or(0),
            resets_in: Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(window_ms)),
        })
    }

    async fn claim(&self, key: &str, owner: &str, ttl: Duration) -> Result<ClaimOutcome> {
        let key = Self::namespaced(key);
        let ttl_ms = millis(ttl);

        let claimed: Option<String> = self
            .run("claim", |mut conn| {
                let key = key.clone();
                async move {
                    redis::cmd("SET")
                        .arg(&key)
                        .arg(owner)
                        .arg("NX")
                        .arg("PX")
                        .arg(ttl_ms)
                        .query_async(&mut conn)
                        .await
                }
            })
            .await?;

        if claimed.is_some() {
            return Ok(ClaimOutcome::Claimed);
        }

        let remaining_ms: i64 = self
            .run("claim_ttl", |mut conn| async move {
                redis::cmd("PTTL").arg(&key).query_async(&mut conn).await
            })
            .await?;

        Ok(ClaimOutcome::Held {
            remaining: Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0)),
        })
    }

    async fn hold(&self, key: &str, owner: &str, ttl: Duration) -> Result<()> {
        let key = Self::namespaced(key);
        let ttl_ms = millis(ttl);

        self.run("hold", |mut conn| async move {
            redis::cmd("SET")
                .arg(&key)
                .arg(owner)
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn release(&self, key: &str, owner: &str) -> Result<()> {
        let key = Self::namespaced(key);

        let _deleted: i64 = self
            .run("release", |mut conn| async move {
                self.release_script
                    .key(&key)
                    .arg(owner)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(())
    }
}
