//! 有效期校验

use chrono::{DateTime, Utc};
use serde_json::json;

use super::Rejection;
use crate::models::{CodeRule, ErrorCode, Project};

/// 项目启用 → 规则启用 → 有效期窗口，按此顺序返回第一个失败
///
/// 未开始与已结束都归为 `PROJECT_EXPIRED`，由 details 区分。
pub fn validate_vigency(
    project: &Project,
    rule: &CodeRule,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if !project.is_active {
        return Err(Rejection::new(
            ErrorCode::ProjectInactive,
            "Project is not active",
        ));
    }

    if !rule.is_active {
        return Err(Rejection::new(ErrorCode::RuleInactive, "Code rule is not active"));
    }

    if let Some(starts_at) = project.starts_at {
        if now < starts_at {
            return Err(
                Rejection::new(ErrorCode::ProjectExpired, "Project has not started yet")
                    .with_details(json!({ "startsAt": starts_at.to_rfc3339() })),
            );
        }
    }

    if let Some(ends_at) = project.ends_at {
        if now > ends_at {
            return Err(
                Rejection::new(ErrorCode::ProjectExpired, "Project has expired")
                    .with_details(json!({ "endsAt": ends_at.to_rfc3339() })),
            );
        }
    }

    Ok(())
}
