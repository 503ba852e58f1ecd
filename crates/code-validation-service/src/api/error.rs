//! 接口错误与校验结果的 HTTP 映射

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::ServiceError;
use crate::models::ErrorCode;
use crate::service::ValidationOutcome;

/// 接口错误
///
/// 业务校验失败不走这里，见 `OutcomeResponse`。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("资源不存在: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("Redis错误: {0}")]
    Redis(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Redis(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            // 基础设施错误对外统一
            Self::Database(_) | Self::Redis(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详情只进日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Redis(e) => {
                tracing::error!(error = %e, "Redis 操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
        };

        let body = json!({
            "status": "KO",
            "error_code": self.error_code(),
            "error_message": message,
        });

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::RedemptionNotFound(_) => Self::NotFound("Redemption not found".into()),
            ServiceError::Validation(msg) => Self::Validation(msg),
            ServiceError::Database(e) => Self::Database(e.to_string()),
            ServiceError::Redis(e) => Self::Redis(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// 校验失败错误码对应的 HTTP 状态
pub fn outcome_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidStructure | ErrorCode::InvalidSegment | ErrorCode::InvalidCheckDigit => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::NoMatchingRule => StatusCode::NOT_FOUND,
        ErrorCode::AlreadyRedeemed => StatusCode::CONFLICT,
        ErrorCode::ProjectInactive
        | ErrorCode::ProjectExpired
        | ErrorCode::RuleInactive
        | ErrorCode::GeoBlocked => StatusCode::FORBIDDEN,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
    }
}

/// 校验结果响应：OK 为 200，KO 按错误码映射
pub struct OutcomeResponse(pub ValidationOutcome);

impl IntoResponse for OutcomeResponse {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ValidationOutcome::Ok(_) => StatusCode::OK,
            ValidationOutcome::Ko(failure) => outcome_status(failure.error_code),
        };
        (status, Json(self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_outcome_status_map() {
        let table = [
            (ErrorCode::InvalidStructure, 400),
            (ErrorCode::InvalidSegment, 400),
            (ErrorCode::InvalidCheckDigit, 400),
            (ErrorCode::NoMatchingRule, 404),
            (ErrorCode::AlreadyRedeemed, 409),
            (ErrorCode::ProjectInactive, 403),
            (ErrorCode::ProjectExpired, 403),
            (ErrorCode::RuleInactive, 403),
            (ErrorCode::GeoBlocked, 403),
            (ErrorCode::RateLimited, 429),
            (ErrorCode::AuthFailed, 401),
        ];
        for (code, status) in table {
            assert_eq!(outcome_status(code).as_u16(), status, "{}", code);
        }
    }

    #[tokio::test]
    async fn test_internal_errors_are_hidden() {
        let response = ApiError::Database("password authentication failed for user".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error_code"], "INTERNAL_ERROR");
        assert!(!body["error_message"].as_str().unwrap().contains("password"));
    }

    #[test]
    fn test_from_service_error() {
        let err: ApiError = ServiceError::RedemptionNotFound(uuid::Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: ApiError = ServiceError::Validation("limit".into()).into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err: ApiError = ServiceError::Lock("k".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
