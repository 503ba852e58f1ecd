//! 兑换台账
//!
//! 以 (规则, 码哈希) 为键，首次兑换时创建，之后递增计数直至上限；本服务从不删除。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 台账条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedCode {
    pub id: Uuid,
    pub code_rule_id: Uuid,
    /// 规范化码的 SHA-256（十六进制小写）
    pub code_hash: String,
    /// 仅在配置 store_plain_codes 时保存
    #[sqlx(default)]
    pub code_plain: Option<String>,
    #[sqlx(default)]
    pub ow_user_id: Option<String>,
    #[sqlx(default)]
    pub ow_transaction_id: Option<String>,
    #[sqlx(default)]
    pub ip_address: Option<String>,
    #[sqlx(default)]
    pub metadata: Option<Value>,
    pub redemption_count: i32,
    /// 首次兑换时间
    pub redeemed_at: DateTime<Utc>,
}

/// 新建台账条目
#[derive(Debug, Clone, Default)]
pub struct NewRedemption {
    pub code_rule_id: Uuid,
    pub code_hash: String,
    pub code_plain: Option<String>,
    pub ow_user_id: Option<String>,
    pub ow_transaction_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: Option<Value>,
}

/// 台账条目及所属规则、项目信息（查询接口使用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RedemptionDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: RedeemedCode,
    pub rule_name: String,
    pub project_id: Uuid,
    pub project_name: String,
}

/// 台账查询条件
#[derive(Debug, Clone, Default)]
pub struct RedemptionFilter {
    pub project_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// 从 1 开始
    pub page: i64,
    pub limit: i64,
}

impl RedemptionFilter {
    /// 页码过大时返回 None
    pub fn checked_offset(&self) -> Option<i64> {
        (self.page.max(1) - 1).checked_mul(self.limit.max(0))
    }

    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX)
    }
}

/// 按规则统计的兑换条目数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RuleRedemptionCount {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub count: i64,
}

/// 按天（UTC）统计的首次兑换数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyRedemptionCount {
    pub date: NaiveDate,
    pub count: i64,
}

/// 项目兑换统计
///
/// 总数与用户数覆盖全部台账条目；by_day 只覆盖统计窗口，按日期倒序。
/// 未知项目各项均为零。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub project_id: Uuid,
    pub total_redemptions: i64,
    /// 不同的非空 ow_user_id 个数
    pub unique_users: i64,
    pub by_rule: Vec<RuleRedemptionCount>,
    pub by_day: Vec<DailyRedemptionCount>,
}

impl ProjectStats {
    pub fn empty(project_id: Uuid) -> Self {
        Self {
            project_id,
            total_redemptions: 0,
            unique_users: 0,
            by_rule: Vec::new(),
            by_day: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        let filter = |page, limit| RedemptionFilter {
            page,
            limit,
            ..Default::default()
        };
        assert_eq!(filter(1, 50).offset(), 0);
        assert_eq!(filter(3, 20).offset(), 40);
        assert_eq!(filter(0, 20).offset(), 0);

        let huge = filter(i64::MAX, 100);
        assert_eq!(huge.checked_offset(), None);
        assert_eq!(huge.offset(), i64::MAX);
    }
}
