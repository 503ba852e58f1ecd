//! 测试工具模块
//!
//! 测试数据生成器，以及基于内存存储、内存缓存和进程内锁组装的完整服务。

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use codeguard_shared::cache::MemoryCache;
use serde_json::json;
use uuid::Uuid;

use crate::api::{AppState, build_router};
use crate::cache::ProjectRuleCache;
use crate::check_digit::CheckDigitRegistry;
use crate::lock::{LocalLockManager, LockConfig};
use crate::models::{
    Charset, CheckAlgorithm, CheckDigitPosition, CodeRule, Project, Segment, SegmentKind,
    StructureDefinition,
};
use crate::repository::InMemoryStore;
use crate::service::{PipelineOrchestrator, RedemptionLedger, RedemptionQueryService};

// ==================== 测试数据 ====================

/// 启用中、无时间窗口的项目
pub fn project() -> Project {
    Project {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        name: "Test Project".to_string(),
        description: None,
        starts_at: None,
        ends_at: None,
        is_active: true,
        metadata: None,
        created_at: Utc::now(),
    }
}

/// 构造段
pub fn segment(name: &str, length: usize, kind: SegmentKind) -> Segment {
    Segment {
        name: name.to_string(),
        length,
        description: None,
        kind,
    }
}

/// 默认规则：10 位数字 + 1 位 Luhn 校验位，单次兑换
///
/// 通过闭包覆盖需要的字段。
pub fn rule_with(customize: impl FnOnce(&mut CodeRule)) -> CodeRule {
    let mut rule = CodeRule {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        name: "Luhn 11".to_string(),
        sku_reference: None,
        total_length: 11,
        charset: Charset::Numeric,
        custom_charset: None,
        has_check_digit: true,
        check_algorithm: Some(CheckAlgorithm::Luhn),
        check_digit_position: Some(CheckDigitPosition::Last),
        structure: StructureDefinition::new(vec![
            segment("unique_code", 10, SegmentKind::Numeric { min: None, max: None }),
            segment(
                "check",
                1,
                SegmentKind::Check {
                    algorithm: None,
                    applies_to: vec!["unique_code".to_string()],
                },
            ),
        ]),
        separator: None,
        case_sensitive: false,
        prefix: None,
        custom_check_function: None,
        max_redemptions: 1,
        product_info: Some(json!({ "sku": "SKU-001" })),
        campaign_info: None,
        points_value: Some(100),
        allowed_countries: Vec::new(),
        is_active: true,
        created_at: Utc::now(),
    };
    customize(&mut rule);
    rule
}

/// 带前缀的规则，码形如 `dn-2026-abcd1234-3`
///
/// 年份段 2024..=2030，8 位字母数字唯一码，Luhn 校验位只覆盖年份。
pub fn prefixed_rule(project_id: Uuid) -> CodeRule {
    rule_with(|r| {
        r.project_id = project_id;
        r.name = "Prefixed".to_string();
        r.prefix = Some("DN".to_string());
        r.separator = Some("-".to_string());
        r.total_length = 13;
        r.charset = Charset::Alphanumeric;
        r.structure = StructureDefinition::new(vec![
            segment(
                "year",
                4,
                SegmentKind::Numeric {
                    min: Some(2024),
                    max: Some(2030),
                },
            ),
            segment("unique_code", 8, SegmentKind::Alphanumeric),
            segment(
                "check",
                1,
                SegmentKind::Check {
                    algorithm: Some("luhn".to_string()),
                    applies_to: vec!["year".to_string()],
                },
            ),
        ]);
    })
}

// ==================== 组装服务 ====================

/// 内存版服务
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub locks: LocalLockManager,
    pub pipeline: Arc<PipelineOrchestrator>,
    pub state: AppState,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_lock_config(LockConfig::default())
    }

    pub fn with_lock_config(lock_config: LockConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let locks = LocalLockManager::new(lock_config.clone());

        let project_cache = Arc::new(ProjectRuleCache::new(
            cache.clone(),
            store.clone(),
            Duration::from_secs(300),
        ));
        let ledger = Arc::new(RedemptionLedger::new(
            store.clone(),
            Arc::new(locks.clone()),
            lock_config.lease,
        ));
        let pipeline = Arc::new(PipelineOrchestrator::new(
            project_cache.clone(),
            ledger,
            CheckDigitRegistry::default(),
        ));
        let queries = Arc::new(RedemptionQueryService::new(store.clone()));

        let state = AppState::new(pipeline.clone(), queries, project_cache);

        Self {
            store,
            cache,
            locks,
            pipeline,
            state,
        }
    }

    /// 写入项目及其规则，规则的 project_id 会被改为该项目
    pub fn seed(&self, project: Project, rules: Vec<CodeRule>) -> Project {
        for mut rule in rules {
            rule.project_id = project.id;
            self.store.insert_rule(rule);
        }
        self.store.insert_project(project.clone());
        project
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}
