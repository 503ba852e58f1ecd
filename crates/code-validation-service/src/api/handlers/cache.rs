//! 项目缓存失效接口
//!
//! 规则由外部管理系统维护，变更后调用这里让下一次校验读到新数据。

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::api::state::AppState;

/// 失效单个项目
///
/// DELETE /api/v1/cache/projects/{project_id}
pub async fn invalidate_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Json<Value> {
    state.project_cache.invalidate(project_id).await;
    info!(project_id = %project_id, "Project cache invalidated");
    Json(json!({ "invalidated": 1 }))
}

/// 失效全部项目
///
/// DELETE /api/v1/cache/projects
pub async fn invalidate_all_projects(State(state): State<AppState>) -> Json<Value> {
    let removed = state.project_cache.invalidate_all().await;
    info!(removed, "All project caches invalidated");
    Json(json!({ "invalidated": removed }))
}
