//! 服务层
//!
//! - `pipeline`: 校验管线编排
//! - `ledger`: 兑换台账（唯一性）
//! - `query_service`: 兑换记录查询
//! - `dto`: 数据传输对象

pub mod dto;
pub mod ledger;
pub mod pipeline;
pub mod query_service;

pub use dto::*;
pub use ledger::{RedeemOutcome, RedemptionContext, RedemptionLedger, code_hash};
pub use pipeline::{DRY_RUN_REDEMPTION_ID, PipelineOrchestrator};
pub use query_service::{RedemptionQuery, RedemptionQueryService, STATS_WINDOW_DAYS};
