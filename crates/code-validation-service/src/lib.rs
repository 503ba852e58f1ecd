//! 码校验服务
//!
//! 对外部生成的营销码做结构、校验位、有效期和地域校验，并在台账中记录兑换。
//!
//! ## 核心功能
//!
//! - **规则匹配**：按项目的启用规则逐条尝试，第一条结构匹配的规则生效
//! - **校验位**：LUHN / MOD10 / MOD11 / MOD97 / VERHOEFF / DAMM，以及受限执行的 CUSTOM 表达式
//! - **兑换台账**：按 (规则, 码哈希) 加分布式锁，保证不超过兑换上限
//! - **校验模式**：正常兑换、dry run（只校验）、沙箱（完整校验但不落账）
//!
//! ## 模块结构
//!
//! - `models`: 领域模型
//! - `check_digit`: 校验位算法库
//! - `validation`: 规范化、结构、段、有效期与地域校验
//! - `repository`: PostgreSQL 与内存存储
//! - `cache`: 项目规则读穿缓存
//! - `lock`: 分布式锁
//! - `service`: 校验管线、兑换台账与查询服务
//! - `api`: HTTP 接口

pub mod api;
pub mod cache;
pub mod check_digit;
pub mod error;
pub mod lock;
pub mod models;
pub mod repository;
pub mod service;
pub mod test_utils;
pub mod validation;

pub use cache::ProjectRuleCache;
pub use check_digit::{CheckDigitRegistry, CustomCheckRunner};
pub use error::{Result, ServiceError};
pub use lock::{DistributedLock, LocalLockManager, LockConfig, LockGuard, RedisLockManager};
pub use models::*;
pub use repository::{InMemoryStore, LedgerRepository, ProjectRepository};
pub use service::{
    PipelineOrchestrator, RedemptionLedger, RedemptionQueryService, ValidateRequest,
    ValidationOutcome,
};
