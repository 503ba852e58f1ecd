//! 码校验服务错误类型
//!
//! 校验失败（INVALID_*、ALREADY_REDEEMED 等）是业务结果而不是错误，
//! 以 `ValidationOutcome::Ko` 返回；这里只包含基础设施和请求层面的错误。

use codeguard_shared::error::CodeGuardError;
use thiserror::Error;
use uuid::Uuid;

/// 码校验服务错误
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("兑换记录不存在: {0}")]
    RedemptionNotFound(Uuid),

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis 错误: {0}")]
    Redis(String),

    #[error("锁错误: {0}")]
    Lock(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Redis(_) | Self::Lock(_))
    }

    /// 是否属于调用方可见的业务错误
    pub fn is_business_error(&self) -> bool {
        matches!(self, Self::RedemptionNotFound(_) | Self::Validation(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RedemptionNotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Lock(_) => "LOCK_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(e: redis::RedisError) -> Self {
        Self::Redis(e.to_string())
    }
}

impl From<CodeGuardError> for ServiceError {
    fn from(e: CodeGuardError) -> Self {
        match e {
            CodeGuardError::Database(e) => Self::Database(e),
            CodeGuardError::Redis(e) => Self::Redis(e.to_string()),
            CodeGuardError::Serialization(e) => Self::Serialization(e),
            CodeGuardError::LockConflict { resource } => Self::Lock(resource),
            other => Self::Internal(other.to_string()),
        }
    }
}
