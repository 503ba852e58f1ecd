//! 码规则相关枚举
//!
//! 数据库中以 varchar 存储，JSON 中使用 SCREAMING_SNAKE_CASE。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 码载荷允许的字符集
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Charset {
    #[default]
    Numeric,
    AlphaUpper,
    AlphaLower,
    Alphanumeric,
    /// 由规则的 custom_charset 白名单决定
    Custom,
}

/// 校验位算法
///
/// 封闭集合，分派见 `check_digit::algorithm_for`。JSON 同时接受小写别名（结构定义里常见 "luhn"）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckAlgorithm {
    #[serde(rename = "LUHN", alias = "luhn")]
    Luhn,
    #[serde(rename = "MOD10", alias = "mod10")]
    Mod10,
    #[serde(rename = "MOD11", alias = "mod11")]
    Mod11,
    #[serde(rename = "MOD97", alias = "mod97")]
    Mod97,
    #[serde(rename = "VERHOEFF", alias = "verhoeff")]
    Verhoeff,
    #[serde(rename = "DAMM", alias = "damm")]
    Damm,
    #[serde(rename = "CUSTOM", alias = "custom")]
    Custom,
}

impl CheckAlgorithm {
    pub const ALL: [CheckAlgorithm; 7] = [
        Self::Luhn,
        Self::Mod10,
        Self::Mod11,
        Self::Mod97,
        Self::Verhoeff,
        Self::Damm,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Luhn => "LUHN",
            Self::Mod10 => "MOD10",
            Self::Mod11 => "MOD11",
            Self::Mod97 => "MOD97",
            Self::Verhoeff => "VERHOEFF",
            Self::Damm => "DAMM",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for CheckAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知的算法名
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("未知的校验位算法: {0}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for CheckAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == upper)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// 校验位在码中的位置（仅元数据，实际位置由结构定义中的 check 段决定）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckDigitPosition {
    #[default]
    Last,
    First,
}

/// 校验失败错误码（对外稳定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidStructure,
    InvalidSegment,
    InvalidCheckDigit,
    NoMatchingRule,
    AlreadyRedeemed,
    ProjectInactive,
    ProjectExpired,
    RuleInactive,
    GeoBlocked,
    /// 由上游限流组件产生
    RateLimited,
    /// 由上游认证组件产生
    AuthFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidStructure => "INVALID_STRUCTURE",
            Self::InvalidSegment => "INVALID_SEGMENT",
            Self::InvalidCheckDigit => "INVALID_CHECK_DIGIT",
            Self::NoMatchingRule => "NO_MATCHING_RULE",
            Self::AlreadyRedeemed => "ALREADY_REDEEMED",
            Self::ProjectInactive => "PROJECT_INACTIVE",
            Self::ProjectExpired => "PROJECT_EXPIRED",
            Self::RuleInactive => "RULE_INACTIVE",
            Self::GeoBlocked => "GEO_BLOCKED",
            Self::RateLimited => "RATE_LIMITED",
            Self::AuthFailed => "AUTH_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 管线运行模式，用于遥测标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Live,
    DryRun,
    Sandbox,
}

impl ValidationMode {
    /// sandbox 优先于 dry_run
    pub fn from_flags(dry_run: bool, sandbox: bool) -> Self {
        match (dry_run, sandbox) {
            (_, true) => Self::Sandbox,
            (true, false) => Self::DryRun,
            (false, false) => Self::Live,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::DryRun => "dry_run",
            Self::Sandbox => "sandbox",
        }
    }

    pub fn persists(&self) -> bool {
        matches!(self, Self::Live)
    }
}
