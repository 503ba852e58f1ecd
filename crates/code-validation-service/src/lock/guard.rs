//! 锁守卫

use dashmap::DashMap;
use redis::Client as RedisClient;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::error::{Result, ServiceError};

/// 持有中的锁
///
/// 应显式调用 `release()`。未释放就被 drop 时（如请求被取消），进程内锁同步释放，
/// Redis/数据库锁在当前 tokio 运行时上异步释放；没有运行时则等租约过期。
pub struct LockGuard {
    key: String,
    owner: String,
    backend: LockBackend,
    released: bool,
}

pub(crate) type LocalLockTable = Arc<DashMap<String, (String, Instant)>>;

#[derive(Clone)]
pub(crate) enum LockBackend {
    Redis(RedisClient),
    Database(PgPool),
    Local(LocalLockTable),
}

/// Lua：owner 匹配才删除
const RELEASE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

impl LockGuard {
    pub(crate) fn new(key: String, owner: String, backend: LockBackend) -> Self {
        Self {
            key,
            owner,
            backend,
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 显式释放锁
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        let released = release_backend(&self.backend, &self.key, &self.owner).await?;
        log_release(&self.key, &self.owner, released);
        Ok(())
    }
}

async fn release_backend(backend: &LockBackend, key: &str, owner: &str) -> Result<bool> {
    let released = match backend {
        LockBackend::Redis(client) => {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
                .key(key)
                .arg(owner)
                .invoke_async(&mut conn)
                .await?;
            deleted > 0
        }
        LockBackend::Database(pool) => {
            sqlx::query(r#"DELETE FROM distributed_locks WHERE lock_key = $1 AND owner_id = $2"#)
                .bind(key)
                .bind(owner)
                .execute(pool)
                .await
                .map_err(ServiceError::from)?
                .rows_affected()
                > 0
        }
        LockBackend::Local(table) => release_local(table, key, owner),
    };
    Ok(released)
}

fn log_release(key: &str, owner: &str, released: bool) {
    if released {
        debug!(key = %key, "Lock released");
    } else {
        // 租约已过期，或锁已被其他持有者获取
        warn!(
            key = %key,
            owner = %owner,
            "Lock was already released or owned by another client"
        );
    }
}

fn release_local(table: &LocalLockTable, key: &str, owner: &str) -> bool {
    table.remove_if(key, |_, (holder, _)| holder == owner).is_some()
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let LockBackend::Local(table) = &self.backend {
            release_local(table, &self.key, &self.owner);
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                lock_key = %self.key,
                owner = %self.owner,
                "LockGuard dropped outside a runtime - lock will expire via lease"
            );
            return;
        };

        let backend = self.backend.clone();
        let key = std::mem::take(&mut self.key);
        let owner = std::mem::take(&mut self.owner);
        handle.spawn(async move {
            match release_backend(&backend, &key, &owner).await {
                Ok(released) => log_release(&key, &owner, released),
                Err(e) => warn!(
                    lock_key = %key,
                    error = %e,
                    "Failed to release dropped lock - lock will expire via lease"
                ),
            }
        });
    }
}
