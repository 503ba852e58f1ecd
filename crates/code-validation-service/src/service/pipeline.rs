//! 校验管线编排
//!
//! 阶段顺序：规范化 → 结构 → 段 → 校验位 → 有效期 → 地域 → 台账。
//! 规则按存储顺序逐条尝试，结构或段不匹配时换下一条；第一条结构匹配的规则即被采用，
//! 之后的失败都是终止结果。

use chrono::{DateTime, Utc};
use codeguard_shared::observability::metrics::record_validation;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::dto::{NamedRef, ValidateRequest, ValidationFailure, ValidationOutcome, ValidationSuccess};
use super::ledger::{RedeemOutcome, RedemptionContext, RedemptionLedger};
use crate::cache::ProjectRuleCache;
use crate::check_digit::CheckDigitRegistry;
use crate::error::Result;
use crate::models::{CheckAlgorithm, CodeRule, ErrorCode, Project, SegmentKind, ValidationMode};
use crate::validation::{
    ParsedSegments, SegmentError, SegmentParser, normalize, validate_geo_fence, validate_structure,
    validate_vigency,
};

/// dry run 的占位兑换 id
pub const DRY_RUN_REDEMPTION_ID: &str = "dry-run";

pub struct PipelineOrchestrator {
    projects: Arc<ProjectRuleCache>,
    ledger: Arc<RedemptionLedger>,
    check_digits: CheckDigitRegistry,
}

impl PipelineOrchestrator {
    pub fn new(
        projects: Arc<ProjectRuleCache>,
        ledger: Arc<RedemptionLedger>,
        check_digits: CheckDigitRegistry,
    ) -> Self {
        Self {
            projects,
            ledger,
            check_digits,
        }
    }

    pub fn project_cache(&self) -> &Arc<ProjectRuleCache> {
        &self.projects
    }

    /// 执行校验管线，每次调用都记录遥测
    ///
    /// 业务失败以 `ValidationOutcome::Ko` 返回；只有存储错误返回 Err。
    #[instrument(
        skip(self, request),
        fields(project_id = %request.project_id, mode = request.mode().as_str())
    )]
    pub async fn run_pipeline(&self, request: ValidateRequest) -> Result<ValidationOutcome> {
        let started = Instant::now();
        let mode = request.mode();

        let result = self.run(&request, mode).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(outcome) => {
                let (status, error_code) = match outcome.error_code() {
                    None => ("ok", "none"),
                    Some(code) => ("ko", code.as_str()),
                };
                record_validation(status, error_code, mode.as_str(), elapsed.as_secs_f64());
                info!(
                    project_id = %request.project_id,
                    status = status,
                    error_code = error_code,
                    mode = mode.as_str(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Code validation finished"
                );
            }
            Err(e) => {
                record_validation("error", e.error_code(), mode.as_str(), elapsed.as_secs_f64());
                warn!(
                    project_id = %request.project_id,
                    error = %e,
                    mode = mode.as_str(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Code validation failed"
                );
            }
        }

        result
    }

    async fn run(&self, request: &ValidateRequest, mode: ValidationMode) -> Result<ValidationOutcome> {
        let Some(loaded) = self.projects.get(request.project_id).await? else {
            return Ok(ValidationOutcome::ko(
                ErrorCode::NoMatchingRule,
                "Project not found",
            ));
        };

        for rule in &loaded.rules {
            if let Some(outcome) = self.try_rule(request, mode, &loaded.project, rule).await? {
                return Ok(outcome);
            }
        }

        Ok(ValidationOutcome::Ko(
            ValidationFailure::new(
                ErrorCode::NoMatchingRule,
                "No code rule matches the provided code",
            )
            .with_details(json!({ "rules_evaluated": loaded.rules.len() })),
        ))
    }

    /// 用单条规则校验；返回 None 表示规则不匹配
    async fn try_rule(
        &self,
        request: &ValidateRequest,
        mode: ValidationMode,
        project: &Project,
        rule: &CodeRule,
    ) -> Result<Option<ValidationOutcome>> {
        let normalized = normalize(&request.code, rule);

        let payload = match validate_structure(&normalized, rule) {
            Ok(payload) => payload,
            Err(mismatch) => {
                debug!(rule_id = %rule.id, reason = %mismatch, "Rule does not match structure");
                return Ok(None);
            }
        };

        let segments = match SegmentParser::parse(payload, &rule.structure) {
            Ok(segments) => segments,
            Err(SegmentError::Overflow {
                segment,
                offset,
                length,
                payload_len,
            }) => {
                warn!(
                    rule_id = %rule.id,
                    segment = %segment,
                    "Segment layout exceeds rule payload length"
                );
                return Ok(Some(ValidationOutcome::Ko(
                    ValidationFailure::new(ErrorCode::InvalidSegment, "Segment exceeds code length")
                        .with_details(json!({
                            "segment": segment,
                            "offset": offset,
                            "length": length,
                            "payload_length": payload_len,
                        })),
                )));
            }
            Err(e) => {
                debug!(rule_id = %rule.id, reason = %e, "Rule does not match segments");
                return Ok(None);
            }
        };

        // 结构匹配，从这里开始结果都是终止的
        if rule.has_check_digit {
            if let Some(failure) = self.verify_check_digit(rule, &segments).await {
                return Ok(Some(ValidationOutcome::Ko(failure)));
            }
        }

        if let Err(rejection) = validate_vigency(project, rule, Utc::now()) {
            return Ok(Some(rejection.into()));
        }

        if let Err(rejection) = validate_geo_fence(rule, request.country.as_deref()) {
            return Ok(Some(rejection.into()));
        }

        let success = |redemption_id: String,
                       redeemed_at: DateTime<Utc>,
                       redemption_count: Option<i32>,
                       sandbox: bool| {
            ValidationOutcome::Ok(ValidationSuccess {
                code: request.code.clone(),
                code_normalized: normalized.clone(),
                project: NamedRef {
                    id: project.id,
                    name: project.name.clone(),
                },
                code_rule: NamedRef {
                    id: rule.id,
                    name: rule.name.clone(),
                },
                product_info: rule.product_info.clone(),
                campaign_info: rule.campaign_info.clone(),
                points_value: rule.points_value,
                redeemed_at: Some(redeemed_at),
                redemption_id: Some(redemption_id),
                redemption_count,
                sandbox,
            })
        };

        let outcome = match mode {
            ValidationMode::Sandbox => success(
                format!("sandbox-{}", Uuid::new_v4()),
                Utc::now(),
                None,
                true,
            ),
            ValidationMode::DryRun => {
                success(DRY_RUN_REDEMPTION_ID.to_string(), Utc::now(), None, false)
            }
            ValidationMode::Live => {
                let context = RedemptionContext {
                    ow_user_id: request.ow_user_id.clone(),
                    ow_transaction_id: request.ow_transaction_id.clone(),
                    ip_address: request.ip_address.clone(),
                    metadata: request.metadata.clone(),
                };
                match self.ledger.redeem(&normalized, rule, &context).await? {
                    RedeemOutcome::Redeemed(entry) => success(
                        entry.id.to_string(),
                        entry.redeemed_at,
                        Some(entry.redemption_count),
                        false,
                    ),
                    RedeemOutcome::AlreadyRedeemed { redeemed_at } => {
                        let failure = ValidationFailure::new(
                            ErrorCode::AlreadyRedeemed,
                            "This code has already been redeemed",
                        );
                        ValidationOutcome::Ko(match redeemed_at {
                            Some(at) => {
                                failure.with_details(json!({ "redeemed_at": at.to_rfc3339() }))
                            }
                            None => failure,
                        })
                    }
                    RedeemOutcome::LockUnavailable => ValidationOutcome::ko(
                        ErrorCode::AlreadyRedeemed,
                        "Could not acquire lock, possible concurrent redemption",
                    ),
                }
            }
        };

        Ok(Some(outcome))
    }

    /// 校验位验证；通过返回 None
    ///
    /// 算法取规则声明，规则未声明时取 check 段上的算法；都没有或无法识别时拒绝。
    async fn verify_check_digit(
        &self,
        rule: &CodeRule,
        segments: &ParsedSegments,
    ) -> Option<ValidationFailure> {
        let check_segment = rule.structure.check_segment()?;
        let SegmentKind::Check {
            algorithm: segment_algorithm,
            applies_to,
        } = &check_segment.kind
        else {
            return None;
        };

        let algorithm = rule.check_algorithm.or_else(|| {
            segment_algorithm
                .as_deref()
                .and_then(|name| name.parse::<CheckAlgorithm>().ok())
        });

        let Some(algorithm) = algorithm else {
            warn!(rule_id = %rule.id, "Rule requires a check digit but declares no usable algorithm");
            return Some(ValidationFailure::new(
                ErrorCode::InvalidCheckDigit,
                "Check digit verification failed",
            ));
        };

        let input = segments.concat(applies_to);
        let check = segments.get(&check_segment.name).unwrap_or("");

        let valid = self
            .check_digits
            .verify(algorithm, &input, check, rule.custom_check_function.as_ref())
            .await;

        if valid {
            None
        } else {
            Some(
                ValidationFailure::new(
                    ErrorCode::InvalidCheckDigit,
                    "Check digit verification failed",
                )
                .with_details(json!({ "algorithm": algorithm.as_str() })),
            )
        }
    }
}
