//! 兑换台账仓储
//!
//! redeemed_codes 上 (code_rule_id, code_hash) 唯一；计数递增带上限条件，
//! 即使锁租约过期，存储侧也不会超发。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::traits::LedgerRepositoryTrait;
use crate::error::Result;
use crate::models::{
    DailyRedemptionCount, NewRedemption, ProjectStats, RedeemedCode, RedemptionDetail,
    RedemptionFilter, RuleRedemptionCount,
};

const ENTRY_COLUMNS: &str = "id, code_rule_id, code_hash, code_plain, ow_user_id, \
     ow_transaction_id, ip_address, metadata, redemption_count, redeemed_at";

const DETAIL_SELECT: &str = r#"
    SELECT rc.id, rc.code_rule_id, rc.code_hash, rc.code_plain, rc.ow_user_id,
           rc.ow_transaction_id, rc.ip_address, rc.metadata, rc.redemption_count,
           rc.redeemed_at, cr.name AS rule_name, p.id AS project_id, p.name AS project_name
    FROM redeemed_codes rc
    JOIN code_rules cr ON rc.code_rule_id = cr.id
    JOIN projects p ON cr.project_id = p.id
"#;

/// 列表过滤条件，参数为 NULL 时不过滤
const LIST_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR cr.project_id = $1)
      AND ($2::timestamptz IS NULL OR rc.redeemed_at >= $2)
      AND ($3::timestamptz IS NULL OR rc.redeemed_at <= $3)
"#;

pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerRepositoryTrait for LedgerRepository {
    #[instrument(skip(self))]
    async fn fetch_entry(&self, rule_id: Uuid, code_hash: &str) -> Result<Option<RedeemedCode>> {
        let sql = format!(
            "SELECT {} FROM redeemed_codes WHERE code_rule_id = $1 AND code_hash = $2",
            ENTRY_COLUMNS
        );
        let entry = sqlx::query_as::<_, RedeemedCode>(&sql)
            .bind(rule_id)
            .bind(code_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    #[instrument(skip(self, entry), fields(rule_id = %entry.code_rule_id))]
    async fn insert_entry(&self, entry: &NewRedemption) -> Result<Option<RedeemedCode>> {
        let sql = format!(
            r#"
            INSERT INTO redeemed_codes
                (id, code_rule_id, code_hash, code_plain, ow_user_id, ow_transaction_id,
                 ip_address, metadata, redemption_count, redeemed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, NOW())
            ON CONFLICT (code_rule_id, code_hash) DO NOTHING
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );
        let inserted = sqlx::query_as::<_, RedeemedCode>(&sql)
            .bind(Uuid::now_v7())
            .bind(entry.code_rule_id)
            .bind(&entry.code_hash)
            .bind(&entry.code_plain)
            .bind(&entry.ow_user_id)
            .bind(&entry.ow_transaction_id)
            .bind(&entry.ip_address)
            .bind(&entry.metadata)
            .fetch_optional(&self.pool)
            .await?;
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn increment_entry(
        &self,
        id: Uuid,
        max_redemptions: i32,
    ) -> Result<Option<RedeemedCode>> {
        let sql = format!(
            r#"
            UPDATE redeemed_codes
            SET redemption_count = redemption_count + 1
            WHERE id = $1 AND redemption_count < $2
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );
        let updated = sqlx::query_as::<_, RedeemedCode>(&sql)
            .bind(id)
            .bind(max_redemptions)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<RedemptionDetail>> {
        let sql = format!("{} WHERE rc.id = $1", DETAIL_SELECT);
        let detail = sqlx::query_as::<_, RedemptionDetail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(detail)
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &RedemptionFilter) -> Result<(Vec<RedemptionDetail>, i64)> {
        let sql = format!(
            "{} {} ORDER BY rc.redeemed_at DESC, rc.id DESC LIMIT $4 OFFSET $5",
            DETAIL_SELECT, LIST_FILTER
        );
        let items = sqlx::query_as::<_, RedemptionDetail>(&sql)
            .bind(filter.project_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.limit)
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!(
            r#"
            SELECT COUNT(*)
            FROM redeemed_codes rc
            JOIN code_rules cr ON rc.code_rule_id = cr.id
            {}
            "#,
            LIST_FILTER
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.project_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    #[instrument(skip(self))]
    async fn project_stats(&self, project_id: Uuid, since: DateTime<Utc>) -> Result<ProjectStats> {
        let (total_redemptions, unique_users): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT rc.ow_user_id)
            FROM redeemed_codes rc
            JOIN code_rules cr ON rc.code_rule_id = cr.id
            WHERE cr.project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let by_rule = sqlx::query_as::<_, RuleRedemptionCount>(
            r#"
            SELECT cr.id AS rule_id, cr.name AS rule_name, COUNT(*) AS count
            FROM redeemed_codes rc
            JOIN code_rules cr ON rc.code_rule_id = cr.id
            WHERE cr.project_id = $1
            GROUP BY cr.id, cr.name
            ORDER BY count DESC, cr.name, cr.id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let by_day = sqlx::query_as::<_, DailyRedemptionCount>(
            r#"
            SELECT (rc.redeemed_at AT TIME ZONE 'UTC')::date AS date, COUNT(*) AS count
            FROM redeemed_codes rc
            JOIN code_rules cr ON rc.code_rule_id = cr.id
            WHERE cr.project_id = $1 AND rc.redeemed_at >= $2
            GROUP BY 1
            ORDER BY 1 DESC
            "#,
        )
        .bind(project_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(ProjectStats {
            project_id,
            total_redemptions,
            unique_users,
            by_rule,
            by_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeguard_shared::database::Database;
    use codeguard_shared::config::DatabaseConfig;

    /// 需要已建表的 PostgreSQL：DATABASE_URL=... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "需要 PostgreSQL"]
    async fn test_list_against_database() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let db = Database::connect(&DatabaseConfig {
            url,
            ..Default::default()
        })
        .await
        .unwrap();
        let repo = LedgerRepository::new(db.pool().clone());

        let filter = RedemptionFilter {
            page: 1,
            limit: 10,
            ..Default::default()
        };
        let (items, total) = repo.list(&filter).await.unwrap();
        assert!(items.len() as i64 <= total);
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL"]
    async fn test_stats_of_unknown_project_against_database() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let db = Database::connect(&DatabaseConfig {
            url,
            ..Default::default()
        })
        .await
        .unwrap();
        let repo = LedgerRepository::new(db.pool().clone());

        let project_id = Uuid::new_v4();
        let stats = repo.project_stats(project_id, Utc::now()).await.unwrap();
        assert_eq!(stats, ProjectStats::empty(project_id));
    }
}
