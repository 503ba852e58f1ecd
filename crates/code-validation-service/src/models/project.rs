//! 项目
//!
//! 项目归属于租户，拥有有序的规则集合，可选有效期窗口 [starts_at, ends_at]。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::rule::CodeRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    #[sqlx(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[sqlx(default)]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// 项目及其启用规则（按存储顺序），即缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithRules {
    pub project: Project,
    pub rules: Vec<CodeRule>,
}
