//! 兑换记录查询服务（只读）

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::dto::{NamedRef, Pagination, RedemptionDto, RedemptionPage, RedemptionSummaryDto};
use crate::error::{Result, ServiceError};
use crate::models::{ProjectStats, RedemptionDetail, RedemptionFilter};
use crate::repository::LedgerRepositoryTrait;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;
/// 按天统计的窗口
pub const STATS_WINDOW_DAYS: i64 = 30;

/// 列表查询参数
#[derive(Debug, Clone, Default)]
pub struct RedemptionQuery {
    pub project_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub struct RedemptionQueryService {
    repository: Arc<dyn LedgerRepositoryTrait>,
}

impl RedemptionQueryService {
    pub fn new(repository: Arc<dyn LedgerRepositoryTrait>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self))]
    pub async fn get_redemption(&self, id: Uuid) -> Result<RedemptionDto> {
        let detail = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::RedemptionNotFound(id))?;

        Ok(RedemptionDto {
            id: detail.entry.id,
            code_hash: detail.entry.code_hash,
            code_rule: NamedRef {
                id: detail.entry.code_rule_id,
                name: detail.rule_name,
            },
            project: NamedRef {
                id: detail.project_id,
                name: detail.project_name,
            },
            ow_user_id: detail.entry.ow_user_id,
            ow_transaction_id: detail.entry.ow_transaction_id,
            redemption_count: detail.entry.redemption_count,
            redeemed_at: detail.entry.redeemed_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_redemptions(&self, query: RedemptionQuery) -> Result<RedemptionPage> {
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page < 1 {
            return Err(ServiceError::Validation("page 必须大于等于 1".into()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ServiceError::Validation(format!(
                "limit 必须在 1 到 {} 之间",
                MAX_PAGE_LIMIT
            )));
        }
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(ServiceError::Validation("from 不能晚于 to".into()));
            }
        }

        let filter = RedemptionFilter {
            project_id: query.project_id,
            from: query.from,
            to: query.to,
            page,
            limit,
        };
        if filter.checked_offset().is_none() {
            return Err(ServiceError::Validation("page 超出范围".into()));
        }
        let (items, total) = self.repository.list(&filter).await?;

        Ok(RedemptionPage {
            data: items.into_iter().map(summary).collect(),
            pagination: Pagination::new(page, limit, total),
        })
    }

    #[instrument(skip(self))]
    pub async fn project_stats(&self, project_id: Uuid) -> Result<ProjectStats> {
        let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);
        self.repository.project_stats(project_id, since).await
    }
}

fn summary(detail: RedemptionDetail) -> RedemptionSummaryDto {
    RedemptionSummaryDto {
        id: detail.entry.id,
        code_hash: detail.entry.code_hash,
        code_rule_id: detail.entry.code_rule_id,
        code_rule_name: detail.rule_name,
        ow_user_id: detail.entry.ow_user_id,
        redemption_count: detail.entry.redemption_count,
        redeemed_at: detail.entry.redeemed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RedeemedCode;
    use crate::repository::MockLedgerRepositoryTrait;

    fn detail() -> RedemptionDetail {
        RedemptionDetail {
            entry: RedeemedCode {
                id: Uuid::new_v4(),
                code_rule_id: Uuid::new_v4(),
                code_hash: "ab".repeat(32),
                code_plain: None,
                ow_user_id: Some("user-1".into()),
                ow_transaction_id: Some("tx-1".into()),
                ip_address: None,
                metadata: None,
                redemption_count: 1,
                redeemed_at: Utc::now(),
            },
            rule_name: "Luhn 11".into(),
            project_id: Uuid::new_v4(),
            project_name: "Spring".into(),
        }
    }

    #[tokio::test]
    async fn test_get_redemption() {
        let found = detail();
        let id = found.entry.id;
        let mut repo = MockLedgerRepositoryTrait::new();
        let returned = found.clone();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(returned.clone())));

        let service = RedemptionQueryService::new(Arc::new(repo));
        let dto = service.get_redemption(id).await.unwrap();
        assert_eq!(dto.code_rule.name, "Luhn 11");
        assert_eq!(dto.project.name, "Spring");
        assert_eq!(dto.ow_transaction_id.as_deref(), Some("tx-1"));
    }

    #[tokio::test]
    async fn test_get_missing_redemption() {
        let mut repo = MockLedgerRepositoryTrait::new();
        repo.expect_get_by_id().returning(|_| Ok(None));

        let service = RedemptionQueryService::new(Arc::new(repo));
        let err = service.get_redemption(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_defaults_and_limits() {
        let mut repo = MockLedgerRepositoryTrait::new();
        repo.expect_list()
            .withf(|f| f.page == 1 && f.limit == DEFAULT_PAGE_LIMIT && f.offset() == 0)
            .times(1)
            .returning(|_| Ok((vec![detail()], 1)));

        let service = RedemptionQueryService::new(Arc::new(repo));
        let page = service
            .list_redemptions(RedemptionQuery::default())
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.pagination.total_pages, 1);

        for limit in [0, 101] {
            let err = service
                .list_redemptions(RedemptionQuery {
                    limit: Some(limit),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_huge_page_is_rejected_before_storage() {
        let mut repo = MockLedgerRepositoryTrait::new();
        repo.expect_list().never();

        let service = RedemptionQueryService::new(Arc::new(repo));
        let err = service
            .list_redemptions(RedemptionQuery {
                page: Some(i64::MAX),
                limit: Some(MAX_PAGE_LIMIT),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_project_stats_uses_window() {
        let project_id = Uuid::new_v4();
        let mut repo = MockLedgerRepositoryTrait::new();
        repo.expect_project_stats()
            .withf(move |id, since| {
                let age = Utc::now() - *since;
                *id == project_id
                    && age >= Duration::days(STATS_WINDOW_DAYS)
                    && age < Duration::days(STATS_WINDOW_DAYS) + Duration::minutes(1)
            })
            .times(1)
            .returning(|id, _| Ok(ProjectStats::empty(id)));

        let service = RedemptionQueryService::new(Arc::new(repo));
        let stats = service.project_stats(project_id).await.unwrap();
        assert_eq!(stats.project_id, project_id);
        assert_eq!(stats.total_redemptions, 0);
    }
}
