//! 仓储 Trait 定义

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    NewRedemption, ProjectStats, ProjectWithRules, RedeemedCode, RedemptionDetail,
    RedemptionFilter,
};

/// 项目仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepositoryTrait: Send + Sync {
    /// 项目（无论是否启用）及其启用中的规则，规则按存储顺序排列
    async fn fetch_active_project_with_rules(
        &self,
        project_id: Uuid,
    ) -> Result<Option<ProjectWithRules>>;
}

/// 兑换台账仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    async fn fetch_entry(&self, rule_id: Uuid, code_hash: &str) -> Result<Option<RedeemedCode>>;

    /// 插入新条目；(规则, 哈希) 已存在时返回 None
    async fn insert_entry(&self, entry: &NewRedemption) -> Result<Option<RedeemedCode>>;

    /// 计数加一，仅在 redemption_count < max 时生效；否则返回 None
    async fn increment_entry(&self, id: Uuid, max_redemptions: i32)
    -> Result<Option<RedeemedCode>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RedemptionDetail>>;

    /// 分页查询，按首次兑换时间倒序；返回 (当前页, 总数)
    async fn list(&self, filter: &RedemptionFilter) -> Result<(Vec<RedemptionDetail>, i64)>;

    /// 项目统计；按天分组只统计 since 之后的条目
    async fn project_stats(&self, project_id: Uuid, since: DateTime<Utc>) -> Result<ProjectStats>;
}
