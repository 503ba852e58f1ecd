//! 路由配置

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use codeguard_shared::observability::middleware as obs_middleware;

use super::{handlers, state::AppState};

/// 对外接口（挂载在 /api/v1 下）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(handlers::validate::validate_code))
        .route("/validate/check", get(handlers::validate::check_code))
        .route("/codes", get(handlers::codes::list_redemptions))
        .route("/codes/{redemption_id}", get(handlers::codes::get_redemption))
        .route("/stats/{project_id}", get(handlers::stats::get_project_stats))
        .route(
            "/cache/projects",
            delete(handlers::cache::invalidate_all_projects),
        )
        .route(
            "/cache/projects/{project_id}",
            delete(handlers::cache::invalidate_project),
        )
}

/// 完整路由：业务接口 + 探针 + 可观测性中间件
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(handlers::health::health_check))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
