//! 码结构定义
//!
//! 结构定义是有序的段列表，各段依次切分载荷（去掉前缀后的码）。
//! JSON 形态：`{"segments":[{"name":"year","type":"numeric","length":4,"min":2024}]}`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::enums::CheckAlgorithm;

/// 结构定义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureDefinition {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// 单个段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: SegmentKind,
}

/// 段类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentKind {
    Fixed {
        value: String,
    },
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Alpha {
        #[serde(default)]
        case: AlphaCase,
    },
    Alphanumeric,
    Enum {
        values: Vec<String>,
    },
    Date {
        /// YYYYMMDD / YYMMDD / YYDDD；未知格式只做数字校验
        format: String,
    },
    Check {
        /// 段级算法名，规则未声明算法时使用
        #[serde(default, skip_serializing_if = "Option::is_none")]
        algorithm: Option<String>,
        #[serde(rename = "appliesTo", default)]
        applies_to: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaCase {
    Upper,
    Lower,
    #[default]
    Both,
}

/// 日期段格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    YyyyMmDd,
    YyMmDd,
    YyDdd,
}

impl DateFormat {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "YYYYMMDD" => Some(Self::YyyyMmDd),
            "YYMMDD" => Some(Self::YyMmDd),
            "YYDDD" => Some(Self::YyDdd),
            _ => None,
        }
    }

    /// 该格式要求的值长度
    pub fn expected_len(&self) -> usize {
        match self {
            Self::YyyyMmDd => 8,
            Self::YyMmDd => 6,
            Self::YyDdd => 5,
        }
    }
}

/// 结构定义不变量违反
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("段长度之和 {actual} 与载荷长度 {expected} 不一致")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("存在多个 check 段: {0}")]
    MultipleCheckSegments(usize),

    #[error("check 段引用了不存在的段: {0}")]
    UnknownReference(String),

    #[error("段名重复: {0}")]
    DuplicateName(String),

    #[error("段 {0} 长度为 0")]
    EmptySegment(String),

    #[error("段 {segment} 的算法无法识别: {algorithm}")]
    UnknownAlgorithm { segment: String, algorithm: String },
}

impl Segment {
    pub fn is_check(&self) -> bool {
        matches!(self.kind, SegmentKind::Check { .. })
    }
}

impl StructureDefinition {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// 段长度之和，溢出时饱和
    pub fn total_length(&self) -> usize {
        self.checked_total_length().unwrap_or(usize::MAX)
    }

    pub fn checked_total_length(&self) -> Option<usize> {
        self.segments
            .iter()
            .try_fold(0usize, |acc, s| acc.checked_add(s.length))
    }

    /// 唯一的 check 段
    pub fn check_segment(&self) -> Option<&Segment> {
        self.segments.iter().find(|s| s.is_check())
    }

    /// 校验结构定义的全部不变量，返回所有违反项
    ///
    /// 供规则管理端在保存前调用；校验管线不会因此拒绝已存储的规则。
    pub fn check_invariants(&self, total_length: usize) -> Vec<StructureError> {
        let mut errors = Vec::new();

        let sum = self.total_length();
        if sum != total_length {
            errors.push(StructureError::LengthMismatch {
                expected: total_length,
                actual: sum,
            });
        }

        let mut seen = HashSet::new();
        for segment in &self.segments {
            if !seen.insert(segment.name.as_str()) {
                errors.push(StructureError::DuplicateName(segment.name.clone()));
            }
            if segment.length == 0 {
                errors.push(StructureError::EmptySegment(segment.name.clone()));
            }
        }

        let checks: Vec<&Segment> = self.segments.iter().filter(|s| s.is_check()).collect();
        if checks.len() > 1 {
            errors.push(StructureError::MultipleCheckSegments(checks.len()));
        }

        for check in checks {
            if let SegmentKind::Check {
                algorithm,
                applies_to,
            } = &check.kind
            {
                for name in applies_to {
                    let exists = self
                        .segments
                        .iter()
                        .any(|s| !s.is_check() && &s.name == name);
                    if !exists {
                        errors.push(StructureError::UnknownReference(name.clone()));
                    }
                }
                if let Some(alg) = algorithm {
                    if alg.parse::<CheckAlgorithm>().is_err() {
                        errors.push(StructureError::UnknownAlgorithm {
                            segment: check.name.clone(),
                            algorithm: alg.clone(),
                        });
                    }
                }
            }
        }

        errors
    }
}
