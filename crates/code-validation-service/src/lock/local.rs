//! 进程内锁
//!
//! 单实例部署与测试使用，语义与 Redis 锁一致：租约到期后可被他人重新获取。

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use super::guard::{LocalLockTable, LockBackend};
use super::{DistributedLock, LockConfig, LockGuard};
use crate::error::{Result, ServiceError};

#[derive(Clone, Default)]
pub struct LocalLockManager {
    table: LocalLockTable,
    config: LockConfig,
}

impl LocalLockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 当前持有的锁数量（含已过期未清理的）
    pub fn held(&self) -> usize {
        self.table.len()
    }

    fn try_lock(&self, key: &str, owner: &str, lease: Duration) -> bool {
        let now = Instant::now();
        match self.table.entry(key.to_string()) {
            Entry::Occupied(mut held) if held.get().1 <= now => {
                held.insert((owner.to_string(), now + lease));
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert((owner.to_string(), now + lease));
                true
            }
        }
    }
}

#[async_trait]
impl DistributedLock for LocalLockManager {
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockGuard> {
        let owner = Uuid::new_v4().to_string();
        let attempts = self.config.retry_count.max(1);

        for attempt in 0..attempts {
            if self.try_lock(key, &owner, lease) {
                debug!(key = %key, attempt = attempt, "Local lock acquired");
                return Ok(LockGuard::new(
                    key.to_string(),
                    owner,
                    LockBackend::Local(self.table.clone()),
                ));
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.config.backoff()).await;
            }
        }

        Err(ServiceError::Lock(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(retry_count: u32) -> LocalLockManager {
        LocalLockManager::new(LockConfig {
            lease: Duration::from_secs(5),
            retry_count,
            retry_delay: Duration::from_millis(5),
            retry_jitter: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_mutual_exclusion() {
        let locks = manager(1);
        let guard = locks.acquire("k", Duration::from_secs(5)).await.unwrap();

        let second = locks.acquire("k", Duration::from_secs(5)).await;
        assert!(matches!(second, Err(ServiceError::Lock(ref k)) if k == "k"));

        // 不同 key 互不影响
        let other = locks.acquire("other", Duration::from_secs(5)).await.unwrap();

        guard.release().await.unwrap();
        other.release().await.unwrap();
        assert_eq!(locks.held(), 0);
        assert!(locks.acquire("k", Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let locks = manager(1);
        let stale = locks.acquire("k", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let fresh = locks.acquire("k", Duration::from_secs(5)).await.unwrap();
        // 过期持有者释放时不能删除新持有者的锁
        stale.release().await.unwrap();
        assert_eq!(locks.held(), 1);
        fresh.release().await.unwrap();
        assert_eq!(locks.held(), 0);
    }

    #[tokio::test]
    async fn test_retry_waits_for_release() {
        let locks = manager(10);
        let guard = locks.acquire("k", Duration::from_secs(5)).await.unwrap();

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("k", Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(12)).await;
        guard.release().await.unwrap();

        let acquired = contender.await.unwrap();
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases_local_lock() {
        let locks = manager(1);
        {
            let _guard = locks.acquire("k", Duration::from_secs(5)).await.unwrap();
            assert_eq!(locks.held(), 1);
        }
        assert_eq!(locks.held(), 0);
    }
}
