//! 结构校验：前缀、长度、字符集

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::models::{Charset, CodeRule};

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());
static ALPHA_UPPER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]+$").unwrap());
static ALPHA_LOWER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]+$").unwrap());
static ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// 规则不适用的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureMismatch {
    #[error("缺少前缀 {0}")]
    MissingPrefix(String),

    #[error("载荷长度 {actual} 与规则要求 {expected} 不符")]
    Length { expected: usize, actual: usize },

    #[error("载荷不符合字符集 {0:?}")]
    Charset(Charset),
}

/// 校验规范化码的结构，成功时返回去掉前缀的载荷
pub fn validate_structure<'a>(
    normalized: &'a str,
    rule: &CodeRule,
) -> Result<&'a str, StructureMismatch> {
    let payload = match rule.effective_prefix() {
        Some(prefix) => normalized
            .strip_prefix(prefix.as_str())
            .ok_or(StructureMismatch::MissingPrefix(prefix))?,
        None => normalized,
    };

    let actual = payload.chars().count();
    if actual != rule.total_length {
        return Err(StructureMismatch::Length {
            expected: rule.total_length,
            actual,
        });
    }

    if !charset_matches(payload, rule) {
        return Err(StructureMismatch::Charset(rule.charset));
    }

    Ok(payload)
}

fn charset_matches(payload: &str, rule: &CodeRule) -> bool {
    match rule.charset {
        Charset::Numeric => NUMERIC.is_match(payload),
        Charset::AlphaUpper => ALPHA_UPPER.is_match(payload),
        Charset::AlphaLower => ALPHA_LOWER.is_match(payload),
        Charset::Alphanumeric => ALPHANUMERIC.is_match(payload),
        Charset::Custom => match rule.custom_charset.as_deref().filter(|w| !w.is_empty()) {
            Some(whitelist) => {
                !payload.is_empty() && payload.chars().all(|c| whitelist.contains(c))
            }
            // 未配置白名单时不限制字符
            None => !payload.is_empty(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::rule_with;

    #[test]
    fn test_prefix_is_stripped() {
        let rule = rule_with(|r| {
            r.prefix = Some("dn".into());
            r.total_length = 13;
            r.charset = Charset::Alphanumeric;
        });
        assert_eq!(
            validate_structure("DN2026ABCD12347", &rule),
            Ok("2026ABCD12347")
        );
    }

    #[test]
    fn test_missing_prefix_is_mismatch() {
        let rule = rule_with(|r| {
            r.prefix = Some("DN".into());
            r.total_length = 4;
        });
        assert_eq!(
            validate_structure("XX1234", &rule),
            Err(StructureMismatch::MissingPrefix("DN".into()))
        );
    }

    #[test]
    fn test_case_sensitive_prefix() {
        let rule = rule_with(|r| {
            r.prefix = Some("dn".into());
            r.case_sensitive = true;
            r.total_length = 4;
        });
        assert!(validate_structure("dn1234", &rule).is_ok());
        assert!(validate_structure("DN1234", &rule).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let rule = rule_with(|r| r.total_length = 11);
        assert_eq!(
            validate_structure("7992739871", &rule),
            Err(StructureMismatch::Length {
                expected: 11,
                actual: 10
            })
        );
    }

    #[test]
    fn test_charsets() {
        let cases = [
            (Charset::Numeric, "1234", true),
            (Charset::Numeric, "12A4", false),
            (Charset::AlphaUpper, "ABCD", true),
            (Charset::AlphaUpper, "ABcD", false),
            (Charset::AlphaLower, "abcd", true),
            (Charset::AlphaLower, "abc1", false),
            (Charset::Alphanumeric, "aB3d", true),
            (Charset::Alphanumeric, "aB-d", false),
        ];
        for (charset, payload, ok) in cases {
            let rule = rule_with(|r| {
                r.charset = charset;
                r.total_length = 4;
            });
            assert_eq!(
                validate_structure(payload, &rule).is_ok(),
                ok,
                "{:?} {}",
                charset,
                payload
            );
        }
    }

    #[test]
    fn test_custom_whitelist() {
        let rule = rule_with(|r| {
            r.charset = Charset::Custom;
            r.custom_charset = Some("ACGT".into());
            r.total_length = 4;
        });
        assert!(validate_structure("GATC", &rule).is_ok());
        assert_eq!(
            validate_structure("GATX", &rule),
            Err(StructureMismatch::Charset(Charset::Custom))
        );

        let open = rule_with(|r| {
            r.charset = Charset::Custom;
            r.custom_charset = None;
            r.total_length = 4;
        });
        assert!(validate_structure("#$%&", &open).is_ok());
    }
}
