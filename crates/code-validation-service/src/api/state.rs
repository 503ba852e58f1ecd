//! 应用状态

use std::sync::Arc;

use crate::cache::ProjectRuleCache;
use crate::service::{PipelineOrchestrator, RedemptionQueryService};

/// Axum 共享状态
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineOrchestrator>,
    pub queries: Arc<RedemptionQueryService>,
    pub project_cache: Arc<ProjectRuleCache>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<PipelineOrchestrator>,
        queries: Arc<RedemptionQueryService>,
        project_cache: Arc<ProjectRuleCache>,
    ) -> Self {
        Self {
            pipeline,
            queries,
            project_cache,
        }
    }
}
