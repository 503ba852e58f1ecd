//! 分布式锁
//!
//! 兑换台账以 (规则, 码哈希) 为粒度加锁。锁是注入的外部能力：
//! 生产环境使用 Redis（可选 PostgreSQL 后备），测试和单机运行使用进程内实现。
//!
//! 正确性前提：租约时长必须大于临界区耗时。租约过期后另一实例可能进入临界区，
//! 此时由存储侧的唯一约束和计数条件兜底。

mod guard;
mod local;
mod redis_lock;

pub use guard::LockGuard;
pub use local::LocalLockManager;
pub use redis_lock::RedisLockManager;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use codeguard_shared::config::ValidationConfig;

/// 锁配置
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 租约时长
    pub lease: Duration,
    /// 获取锁的尝试次数
    pub retry_count: u32,
    /// 重试间隔
    pub retry_delay: Duration,
    /// 重试间隔上附加的随机抖动上限
    pub retry_jitter: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(5),
            retry_count: 3,
            retry_delay: Duration::from_millis(200),
            retry_jitter: Duration::from_millis(100),
        }
    }
}

impl From<&ValidationConfig> for LockConfig {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            lease: config.lock_lease(),
            retry_count: config.lock_retry_count,
            retry_delay: Duration::from_millis(config.lock_retry_delay_ms),
            retry_jitter: Duration::from_millis(config.lock_retry_jitter_ms),
        }
    }
}

impl LockConfig {
    /// 下一次重试前的等待时间
    pub(crate) fn backoff(&self) -> Duration {
        let jitter_ms = self.retry_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=jitter_ms)
        };
        self.retry_delay + Duration::from_millis(jitter)
    }
}

/// 互斥锁能力
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 在重试次数内获取锁；失败时返回 `ServiceError::Lock`
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockGuard>;
}
