//! 项目规则缓存
//!
//! 读穿缓存：projectId → 项目及其启用规则，默认 TTL 300 秒。
//! 缓存永远不是权威数据源，读写失败只记录日志并回落到存储，不会让校验失败。

use codeguard_shared::cache::{CacheBackend, CacheKey};
use codeguard_shared::observability::metrics::record_project_cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::ProjectWithRules;
use crate::repository::ProjectRepositoryTrait;

pub struct ProjectRuleCache {
    backend: Arc<dyn CacheBackend>,
    repository: Arc<dyn ProjectRepositoryTrait>,
    ttl: Duration,
}

impl ProjectRuleCache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        repository: Arc<dyn ProjectRepositoryTrait>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            repository,
            ttl,
        }
    }

    /// 读取项目及其启用规则
    ///
    /// 只有存储错误会返回 Err；项目不存在返回 Ok(None) 且不写缓存。
    #[instrument(skip(self))]
    pub async fn get(&self, project_id: Uuid) -> Result<Option<ProjectWithRules>> {
        let key = CacheKey::project(&project_id.to_string());

        match self.backend.get_raw(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<ProjectWithRules>(&raw) {
                Ok(cached) => {
                    record_project_cache("hit");
                    debug!(project_id = %project_id, "Project cache hit");
                    return Ok(Some(cached));
                }
                Err(e) => {
                    record_project_cache("error");
                    warn!(project_id = %project_id, error = %e, "Corrupt project cache entry, reloading");
                }
            },
            Ok(None) => record_project_cache("miss"),
            Err(e) => {
                record_project_cache("error");
                warn!(project_id = %project_id, error = %e, "Project cache read failed, falling back to storage");
            }
        }

        let loaded = self
            .repository
            .fetch_active_project_with_rules(project_id)
            .await?;

        if let Some(project) = &loaded {
            self.store(&key, project).await;
        }
        Ok(loaded)
    }

    async fn store(&self, key: &str, project: &ProjectWithRules) {
        let raw = match serde_json::to_string(project) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize project for cache");
                return;
            }
        };
        if let Err(e) = self.backend.set_raw(key, &raw, self.ttl).await {
            warn!(key = %key, error = %e, "Project cache write failed");
        }
    }

    /// 规则变更后使单个项目的缓存失效
    #[instrument(skip(self))]
    pub async fn invalidate(&self, project_id: Uuid) {
        let key = CacheKey::project(&project_id.to_string());
        if let Err(e) = self.backend.delete(&key).await {
            warn!(project_id = %project_id, error = %e, "Project cache invalidation failed");
        }
    }

    /// 清空全部项目缓存，返回删除的条目数
    #[instrument(skip(self))]
    pub async fn invalidate_all(&self) -> u64 {
        match self.backend.delete_pattern(CacheKey::all_projects()).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Project cache invalidation failed");
                0
            }
        }
    }
}
