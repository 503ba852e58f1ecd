//! 服务层数据传输对象
//!
//! 对外字段使用 snake_case（`error_code`、`code_normalized`、`redemption_id` 等）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ErrorCode, ValidationMode};
use crate::validation::Rejection;

/// 校验请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub project_id: Uuid,
    #[serde(default)]
    pub ow_user_id: Option<String>,
    #[serde(default)]
    pub ow_transaction_id: Option<String>,
    /// 由接口层从请求头或对端地址填入，不接受请求体中的值
    #[serde(default, skip_deserializing)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// 只校验不兑换
    #[serde(default)]
    pub dry_run: bool,
    /// 沙箱：完整校验但不落账，优先于 dry_run
    #[serde(default)]
    pub sandbox: bool,
}

impl ValidateRequest {
    pub fn new(code: impl Into<String>, project_id: Uuid) -> Self {
        Self {
            code: code.into(),
            project_id,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> ValidationMode {
        ValidationMode::from_flags(self.dry_run, self.sandbox)
    }
}

/// id + 名称
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

/// 校验成功
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSuccess {
    /// 原始输入
    pub code: String,
    pub code_normalized: String,
    pub project: NamedRef,
    pub code_rule: NamedRef,
    pub product_info: Option<Value>,
    pub campaign_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_value: Option<i32>,
    /// 首次兑换时间；dry run / 沙箱为当前时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    /// 台账 id；dry run 为 "dry-run"，沙箱为 "sandbox-{uuid}"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redemption_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redemption_count: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sandbox: bool,
}

/// 校验失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub error_code: ErrorCode,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ValidationFailure {
    pub fn new(error_code: ErrorCode, error_message: impl Into<String>) -> Self {
        Self {
            error_code,
            error_message: error_message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<Rejection> for ValidationFailure {
    fn from(r: Rejection) -> Self {
        Self {
            error_code: r.code,
            error_message: r.message,
            details: r.details,
        }
    }
}

/// 管线结果：`{"status":"OK",...}` 或 `{"status":"KO",...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ValidationOutcome {
    #[serde(rename = "OK")]
    Ok(ValidationSuccess),
    #[serde(rename = "KO")]
    Ko(ValidationFailure),
}

impl ValidationOutcome {
    pub fn ko(error_code: ErrorCode, error_message: impl Into<String>) -> Self {
        Self::Ko(ValidationFailure::new(error_code, error_message))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Ok(_) => None,
            Self::Ko(failure) => Some(failure.error_code),
        }
    }

    pub fn success(&self) -> Option<&ValidationSuccess> {
        match self {
            Self::Ok(success) => Some(success),
            Self::Ko(_) => None,
        }
    }
}

impl From<Rejection> for ValidationOutcome {
    fn from(r: Rejection) -> Self {
        Self::Ko(r.into())
    }
}

/// 兑换记录详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionDto {
    pub id: Uuid,
    pub code_hash: String,
    pub code_rule: NamedRef,
    pub project: NamedRef,
    pub ow_user_id: Option<String>,
    pub ow_transaction_id: Option<String>,
    pub redemption_count: i32,
    pub redeemed_at: DateTime<Utc>,
}

/// 兑换记录列表项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionSummaryDto {
    pub id: Uuid,
    pub code_hash: String,
    pub code_rule_id: Uuid,
    pub code_rule_name: String,
    pub ow_user_id: Option<String>,
    pub redemption_count: i32,
    pub redeemed_at: DateTime<Utc>,
}

/// 分页信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// 兑换记录分页
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionPage {
    pub data: Vec<RedemptionSummaryDto>,
    pub pagination: Pagination,
}
