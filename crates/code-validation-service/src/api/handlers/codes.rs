//! 兑换记录查询接口

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::service::{RedemptionDto, RedemptionPage, RedemptionQuery};

/// 查询单条兑换记录
///
/// GET /api/v1/codes/{redemption_id}
pub async fn get_redemption(
    State(state): State<AppState>,
    Path(redemption_id): Path<Uuid>,
) -> Result<Json<RedemptionDto>, ApiError> {
    let redemption = state.queries.get_redemption(redemption_id).await?;
    Ok(Json(redemption))
}

/// 列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ListRedemptionsParams {
    pub project_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// 分页查询兑换记录，按兑换时间倒序
///
/// GET /api/v1/codes
pub async fn list_redemptions(
    State(state): State<AppState>,
    Query(params): Query<ListRedemptionsParams>,
) -> Result<Json<RedemptionPage>, ApiError> {
    let page = state
        .queries
        .list_redemptions(RedemptionQuery {
            project_id: params.project_id,
            from: params.from,
            to: params.to,
            page: params.page,
            limit: params.limit,
        })
        .await?;
    Ok(Json(page))
}
