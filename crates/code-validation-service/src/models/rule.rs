//! 码规则
//!
//! 结构字段（长度、字符集、结构定义、校验算法、前缀、分隔符、大小写）创建后不可变；
//! 运营字段（启用状态、兑换上限、积分、商品/活动信息、允许国家）可由管理端修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::{Charset, CheckAlgorithm, CheckDigitPosition};
use super::structure::StructureDefinition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRule {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub sku_reference: Option<String>,

    // ---- 结构字段 ----
    /// 载荷长度（不含前缀）
    pub total_length: usize,
    pub charset: Charset,
    #[serde(default)]
    pub custom_charset: Option<String>,
    pub has_check_digit: bool,
    #[serde(default)]
    pub check_algorithm: Option<CheckAlgorithm>,
    #[serde(default)]
    pub check_digit_position: Option<CheckDigitPosition>,
    pub structure: StructureDefinition,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    /// 自定义校验表达式（见 check_digit::custom）
    #[serde(default)]
    pub custom_check_function: Option<Value>,

    // ---- 运营字段 ----
    pub max_redemptions: i32,
    #[serde(default)]
    pub product_info: Option<Value>,
    #[serde(default)]
    pub campaign_info: Option<Value>,
    #[serde(default)]
    pub points_value: Option<i32>,
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CodeRule {
    /// 按大小写设置调整后的前缀
    pub fn effective_prefix(&self) -> Option<String> {
        self.prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| {
                if self.case_sensitive {
                    p.to_string()
                } else {
                    p.to_uppercase()
                }
            })
    }

    /// 兑换上限，非法配置按 1 处理
    pub fn redemption_limit(&self) -> i32 {
        self.max_redemptions.max(1)
    }
}
