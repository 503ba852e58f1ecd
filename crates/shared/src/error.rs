//! 基础设施错误类型
//!
//! 数据库、Redis、序列化与配置等共享组件的错误，使用 thiserror 提供可读信息。
//! 业务校验结果（结构不符、已兑换等）不属于错误，由服务层以返回值表达。

use thiserror::Error;

/// 基础设施错误
#[derive(Debug, Error)]
pub enum CodeGuardError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==================== 并发控制 ====================
    #[error("资源已被锁定: {resource}")]
    LockConflict { resource: String },

    // ==================== 配置与通用错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CodeGuardError>;

impl CodeGuardError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::LockConflict { .. } => "LOCK_CONFLICT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::LockConflict { .. }
        )
    }
}
