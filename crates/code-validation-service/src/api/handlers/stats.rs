//! 项目统计接口

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::models::ProjectStats;

/// 项目兑换统计：总数、用户数、按规则、近 30 天按天
///
/// GET /api/v1/stats/{project_id}
pub async fn get_project_stats(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectStats>, ApiError> {
    let stats = state.queries.project_stats(project_id).await?;
    Ok(Json(stats))
}
