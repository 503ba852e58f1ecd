//! Redis 锁，数据库后备

use async_trait::async_trait;
use redis::Client as RedisClient;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::guard::LockBackend;
use super::{DistributedLock, LockConfig, LockGuard};
use crate::error::{Result, ServiceError};

/// Redis 分布式锁管理器
///
/// `SET key owner NX PX lease` 获取，Lua 脚本按 owner 比较后删除。
/// 配置了数据库后备时，Redis 不可用会降级到 `distributed_locks` 表。
pub struct RedisLockManager {
    client: RedisClient,
    fallback: Option<PgPool>,
    config: LockConfig,
    /// 实例标识，区分不同服务实例持有的锁
    instance_id: String,
}

enum Attempt {
    Acquired(LockGuard),
    Busy,
}

impl RedisLockManager {
    pub fn new(client: RedisClient, config: LockConfig) -> Self {
        Self {
            client,
            fallback: None,
            config,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_database_fallback(mut self, pool: PgPool) -> Self {
        self.fallback = Some(pool);
        self
    }

    async fn try_redis(&self, key: &str, owner: &str, lease: Duration) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn try_database(
        &self,
        pool: &PgPool,
        key: &str,
        owner: &str,
        lease: Duration,
    ) -> Result<bool> {
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(lease).map_err(|e| ServiceError::Internal(e.to_string()))?;

        sqlx::query(r#"DELETE FROM distributed_locks WHERE lock_key = $1 AND expires_at < NOW()"#)
            .bind(key)
            .execute(pool)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO distributed_locks (lock_key, owner_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (lock_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(owner)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn attempt(&self, key: &str, owner: &str, lease: Duration) -> Result<Attempt> {
        match self.try_redis(key, owner, lease).await {
            Ok(true) => {
                return Ok(Attempt::Acquired(LockGuard::new(
                    key.to_string(),
                    owner.to_string(),
                    LockBackend::Redis(self.client.clone()),
                )));
            }
            Ok(false) => return Ok(Attempt::Busy),
            Err(e) if self.fallback.is_none() => return Err(e.into()),
            Err(e) => {
                warn!(key = %key, error = %e, "Redis lock failed, falling back to database");
            }
        }

        let Some(pool) = &self.fallback else {
            return Ok(Attempt::Busy);
        };
        if self.try_database(pool, key, owner, lease).await? {
            Ok(Attempt::Acquired(LockGuard::new(
                key.to_string(),
                owner.to_string(),
                LockBackend::Database(pool.clone()),
            )))
        } else {
            Ok(Attempt::Busy)
        }
    }
}

#[async_trait]
impl DistributedLock for RedisLockManager {
    #[instrument(skip(self), fields(instance_id = %self.instance_id))]
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockGuard> {
        let owner = format!("{}:{}", self.instance_id, Uuid::new_v4());
        let attempts = self.config.retry_count.max(1);

        for attempt in 0..attempts {
            match self.attempt(key, &owner, lease).await {
                Ok(Attempt::Acquired(guard)) => {
                    debug!(key = %key, attempt = attempt, "Lock acquired");
                    return Ok(guard);
                }
                Ok(Attempt::Busy) => {
                    debug!(key = %key, attempt = attempt, "Lock busy");
                }
                Err(e) => {
                    warn!(key = %key, attempt = attempt, error = %e, "Lock attempt failed");
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.config.backoff()).await;
            }
        }

        Err(ServiceError::Lock(key.to_string()))
    }
}
