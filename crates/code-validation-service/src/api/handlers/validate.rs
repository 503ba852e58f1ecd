//! 码校验接口

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::api::error::{ApiError, OutcomeResponse};
use crate::api::state::AppState;
use crate::service::{ValidateRequest, ValidationOutcome};

/// 沙箱请求头
pub const SANDBOX_HEADER: &str = "x-sandbox";

/// 校验并兑换
///
/// POST /api/v1/validate
///
/// `x-sandbox: true|1` 开启沙箱；客户端 IP 取自 `x-forwarded-for` 首项、`x-real-ip`，
/// 都没有时取连接对端地址。
pub async fn validate_code(
    State(state): State<AppState>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Json(mut req): Json<ValidateRequest>,
) -> Result<OutcomeResponse, ApiError> {
    if req.code.trim().is_empty() {
        return Err(ApiError::Validation("code is required".into()));
    }

    req.sandbox = req.sandbox || sandbox_requested(&headers);
    let peer = peer.map(|Extension(ConnectInfo(addr))| addr);
    req.ip_address = client_ip(&headers, peer);

    let outcome = state.pipeline.run_pipeline(req).await?;
    Ok(OutcomeResponse(outcome))
}

/// 只读校验参数
#[derive(Debug, Deserialize)]
pub struct CheckParams {
    pub code: String,
    pub project_id: Uuid,
    pub country: Option<String>,
}

/// 只读校验（dry run），响应中不含兑换字段
///
/// GET /api/v1/validate/check
pub async fn check_code(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> Result<OutcomeResponse, ApiError> {
    if params.code.trim().is_empty() {
        return Err(ApiError::Validation("code is required".into()));
    }

    let req = ValidateRequest {
        country: params.country,
        dry_run: true,
        ..ValidateRequest::new(params.code, params.project_id)
    };

    let outcome = match state.pipeline.run_pipeline(req).await? {
        ValidationOutcome::Ok(mut success) => {
            success.redeemed_at = None;
            success.redemption_id = None;
            success.redemption_count = None;
            ValidationOutcome::Ok(success)
        }
        ko => ko,
    };
    Ok(OutcomeResponse(outcome))
}

fn sandbox_requested(headers: &HeaderMap) -> bool {
    headers
        .get(SANDBOX_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| matches!(v.trim(), "true" | "1"))
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(String::from)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_sandbox_header_values() {
        for (value, expected) in [("true", true), ("1", true), ("false", false), ("yes", false)] {
            let mut headers = HeaderMap::new();
            headers.insert(SANDBOX_HEADER, HeaderValue::from_static(value));
            assert_eq!(sandbox_requested(&headers), expected, "{}", value);
        }
        assert!(!sandbox_requested(&HeaderMap::new()));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers, None).as_deref(), Some("10.0.0.9"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, None).as_deref(), Some("203.0.113.7"));

        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.10:54321".parse().unwrap();
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("192.0.2.10")
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.9"));
    }
}
