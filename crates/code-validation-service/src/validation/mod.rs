//! 校验阶段
//!
//! 各阶段都是纯函数：输入规范化码与规则，输出结果值，不访问存储。
//! 结构与段的不匹配只代表“此规则不适用”，由编排器决定是否尝试下一条规则。

pub mod geo_fence;
pub mod normalizer;
pub mod segments;
pub mod structure;
pub mod vigency;

pub use geo_fence::validate_geo_fence;
pub use normalizer::normalize;
pub use segments::{ParsedSegments, SegmentError, SegmentParser};
pub use structure::{StructureMismatch, validate_structure};
pub use vigency::validate_vigency;

use serde_json::Value;

use crate::models::ErrorCode;

/// 终止性校验失败：错误码 + 说明 + 可选细节
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

impl Rejection {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
