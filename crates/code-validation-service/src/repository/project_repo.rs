//! 项目与规则仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::traits::ProjectRepositoryTrait;
use crate::error::Result;
use crate::models::{
    Charset, CheckAlgorithm, CheckDigitPosition, CodeRule, Project, ProjectWithRules,
    StructureDefinition,
};

pub struct ProjectRepository {
    pool: PgPool,
}

/// code_rules 表行，JSON 与枚举列在转换时解析
#[derive(Debug, sqlx::FromRow)]
struct CodeRuleRow {
    id: Uuid,
    project_id: Uuid,
    name: String,
    sku_reference: Option<String>,
    total_length: i32,
    charset: Charset,
    custom_charset: Option<String>,
    has_check_digit: bool,
    check_algorithm: Option<String>,
    check_digit_position: Option<CheckDigitPosition>,
    structure_def: Value,
    separator: Option<String>,
    case_sensitive: bool,
    prefix: Option<String>,
    custom_check_function: Option<Value>,
    max_redemptions: i32,
    product_info: Option<Value>,
    campaign_info: Option<Value>,
    points_value: Option<i32>,
    allowed_countries: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CodeRuleRow> for CodeRule {
    type Error = String;

    fn try_from(row: CodeRuleRow) -> std::result::Result<Self, Self::Error> {
        let structure: StructureDefinition = serde_json::from_value(row.structure_def)
            .map_err(|e| format!("structure_def: {}", e))?;
        if structure.checked_total_length().is_none() {
            return Err("structure_def: 段长度之和溢出".to_string());
        }
        let check_algorithm = row
            .check_algorithm
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<CheckAlgorithm>)
            .transpose()
            .map_err(|e| e.to_string())?;
        let total_length =
            usize::try_from(row.total_length).map_err(|_| "total_length 为负".to_string())?;

        Ok(CodeRule {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            sku_reference: row.sku_reference,
            total_length,
            charset: row.charset,
            custom_charset: row.custom_charset,
            has_check_digit: row.has_check_digit,
            check_algorithm,
            check_digit_position: row.check_digit_position,
            structure,
            separator: row.separator,
            case_sensitive: row.case_sensitive,
            prefix: row.prefix,
            custom_check_function: row.custom_check_function,
            max_redemptions: row.max_redemptions,
            product_info: row.product_info,
            campaign_info: row.campaign_info,
            points_value: row.points_value,
            allowed_countries: row.allowed_countries,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepositoryTrait for ProjectRepository {
    #[instrument(skip(self))]
    async fn fetch_active_project_with_rules(
        &self,
        project_id: Uuid,
    ) -> Result<Option<ProjectWithRules>> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, tenant_id, name, description, starts_at, ends_at,
                   is_active, metadata, created_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(project) = project else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, CodeRuleRow>(
            r#"
            SELECT id, project_id, name, sku_reference, total_length, charset,
                   custom_charset, has_check_digit, check_algorithm, check_digit_position,
                   structure_def, separator, case_sensitive, prefix, custom_check_function,
                   max_redemptions, product_info, campaign_info, points_value,
                   COALESCE(allowed_countries, '{}') AS allowed_countries,
                   is_active, created_at
            FROM code_rules
            WHERE project_id = $1 AND is_active = true
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let rules = rows
            .into_iter()
            .filter_map(|row| {
                let rule_id = row.id;
                CodeRule::try_from(row)
                    .map_err(|e| warn!(rule_id = %rule_id, error = %e, "Skipping malformed code rule"))
                    .ok()
            })
            .collect();

        Ok(Some(ProjectWithRules { project, rules }))
    }
}
