//! 段解析
//!
//! 按声明顺序从载荷中切出连续、不重叠的子串并逐段校验，遇到第一个错误即返回。
//! 段越界说明规则的载荷长度与段长度之和不一致，属于终止性错误 `INVALID_SEGMENT`；
//! 其余段校验失败只表示此规则不匹配。

use chrono::NaiveDate;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::LazyLock;
use thiserror::Error;

use crate::models::{AlphaCase, DateFormat, Segment, SegmentKind, StructureDefinition};

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());
static UPPER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]+$").unwrap());
static LOWER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]+$").unwrap());
static LETTERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]+$").unwrap());
static ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// 段解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// 段超出剩余载荷（终止）
    #[error("段 {segment} 越界: 偏移 {offset} + 长度 {length} > 载荷长度 {payload_len}")]
    Overflow {
        segment: String,
        offset: usize,
        length: usize,
        payload_len: usize,
    },

    /// 段值不符合类型约束（尝试下一条规则）
    #[error("段 {segment} 的值 {value:?} 无效: {reason}")]
    Invalid {
        segment: String,
        value: String,
        reason: String,
    },
}

impl SegmentError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Overflow { .. })
    }

    fn invalid(segment: &Segment, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            segment: segment.name.clone(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// 段名到段值的有序映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSegments {
    entries: Vec<(String, String)>,
}

impl ParsedSegments {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// 按顺序拼接指定段的值，缺失的段视为空串
    pub fn concat(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| self.get(name).unwrap_or(""))
            .collect()
    }
}

impl Serialize for ParsedSegments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 段解析器
pub struct SegmentParser;

impl SegmentParser {
    pub fn parse(
        payload: &str,
        structure: &StructureDefinition,
    ) -> Result<ParsedSegments, SegmentError> {
        let chars: Vec<char> = payload.chars().collect();
        let mut offset: usize = 0;
        let mut parsed = ParsedSegments::default();

        for segment in &structure.segments {
            let end = match offset.checked_add(segment.length) {
                Some(end) if end <= chars.len() => end,
                _ => {
                    return Err(SegmentError::Overflow {
                        segment: segment.name.clone(),
                        offset,
                        length: segment.length,
                        payload_len: chars.len(),
                    });
                }
            };

            let value: String = chars[offset..end].iter().collect();
            validate_segment(segment, &value)?;
            parsed.entries.push((segment.name.clone(), value));
            offset = end;
        }

        Ok(parsed)
    }
}

fn validate_segment(segment: &Segment, value: &str) -> Result<(), SegmentError> {
    match &segment.kind {
        SegmentKind::Fixed { value: expected } => {
            if value != expected {
                return Err(SegmentError::invalid(
                    segment,
                    value,
                    format!("应为固定值 {}", expected),
                ));
            }
        }
        SegmentKind::Numeric { min, max } => {
            if !DIGITS.is_match(value) {
                return Err(SegmentError::invalid(segment, value, "应为数字"));
            }
            // 全数字串解析失败只可能是溢出，按饱和值比较
            let n = value.parse::<i128>().unwrap_or(i128::MAX);
            if let Some(min) = min {
                if n < i128::from(*min) {
                    return Err(SegmentError::invalid(
                        segment,
                        value,
                        format!("小于最小值 {}", min),
                    ));
                }
            }
            if let Some(max) = max {
                if n > i128::from(*max) {
                    return Err(SegmentError::invalid(
                        segment,
                        value,
                        format!("大于最大值 {}", max),
                    ));
                }
            }
        }
        SegmentKind::Alpha { case } => {
            let case_ok = match case {
                AlphaCase::Upper => UPPER.is_match(value),
                AlphaCase::Lower => LOWER.is_match(value),
                AlphaCase::Both => true,
            };
            if !case_ok || !LETTERS.is_match(value) {
                return Err(SegmentError::invalid(segment, value, "应为字母"));
            }
        }
        SegmentKind::Alphanumeric => {
            if !ALNUM.is_match(value) {
                return Err(SegmentError::invalid(segment, value, "应为字母或数字"));
            }
        }
        SegmentKind::Enum { values } => {
            if !values.iter().any(|v| v == value) {
                return Err(SegmentError::invalid(segment, value, "不在枚举值内"));
            }
        }
        SegmentKind::Date { format } => {
            if !DIGITS.is_match(value) {
                return Err(SegmentError::invalid(segment, value, "日期应为数字"));
            }
            if let Some(format) = DateFormat::parse(format) {
                if value.len() == format.expected_len() && !is_valid_date(value, format) {
                    return Err(SegmentError::invalid(segment, value, "日期无效"));
                }
            }
        }
        // 校验位在后续阶段验证
        SegmentKind::Check { .. } => {}
    }
    Ok(())
}

/// 调用方保证 value 为全数字且长度与格式一致
fn is_valid_date(value: &str, format: DateFormat) -> bool {
    let num = |range: std::ops::Range<usize>| value[range].parse::<u32>().unwrap_or(0);
    match format {
        DateFormat::YyyyMmDd => {
            NaiveDate::from_ymd_opt(num(0..4) as i32, num(4..6), num(6..8)).is_some()
        }
        DateFormat::YyMmDd => {
            NaiveDate::from_ymd_opt(2000 + num(0..2) as i32, num(2..4), num(4..6)).is_some()
        }
        DateFormat::YyDdd => (1..=366).contains(&num(2..5)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structure(value: serde_json::Value) -> StructureDefinition {
        serde_json::from_value(json!({ "segments": value })).unwrap()
    }

    #[test]
    fn test_contiguous_segments() {
        let def = structure(json!([
            { "name": "year", "type": "numeric", "length": 4, "min": 2024, "max": 2030 },
            { "name": "unique_code", "type": "alphanumeric", "length": 8 },
            { "name": "check", "type": "check", "length": 1, "algorithm": "luhn", "appliesTo": ["year"] }
        ]));
        let parsed = SegmentParser::parse("2026ABCD12347", &def).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.get("year"), Some("2026"));
        assert_eq!(parsed.get("unique_code"), Some("ABCD1234"));
        assert_eq!(parsed.get("check"), Some("7"));
        let joined: String = parsed.iter().map(|(_, v)| v).collect();
        assert_eq!(joined, "2026ABCD12347");
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"year":"2026","unique_code":"ABCD1234","check":"7"}"#
        );
    }

    #[test]
    fn test_overflow_is_terminal() {
        let def = structure(json!([
            { "name": "a", "type": "numeric", "length": 3 },
            { "name": "b", "type": "numeric", "length": 3 }
        ]));
        let err = SegmentParser::parse("12345", &def).unwrap_err();
        assert!(err.is_terminal());
        assert_eq!(
            err,
            SegmentError::Overflow {
                segment: "b".into(),
                offset: 3,
                length: 3,
                payload_len: 5
            }
        );
    }

    #[test]
    fn test_huge_segment_length_is_overflow() {
        let def = StructureDefinition::new(vec![
            Segment {
                name: "a".into(),
                length: 2,
                description: None,
                kind: SegmentKind::Alphanumeric,
            },
            Segment {
                name: "b".into(),
                length: usize::MAX,
                description: None,
                kind: SegmentKind::Alphanumeric,
            },
        ]);
        let err = SegmentParser::parse("AB12", &def).unwrap_err();
        assert_eq!(
            err,
            SegmentError::Overflow {
                segment: "b".into(),
                offset: 2,
                length: usize::MAX,
                payload_len: 4
            }
        );
    }

    #[test]
    fn test_first_error_wins() {
        let def = structure(json!([
            { "name": "a", "type": "fixed", "length": 2, "value": "AB" },
            { "name": "b", "type": "numeric", "length": 2 }
        ]));
        let err = SegmentParser::parse("XYZZ", &def).unwrap_err();
        assert!(!err.is_terminal());
        assert!(matches!(err, SegmentError::Invalid { ref segment, .. } if segment == "a"));
    }

    #[test]
    fn test_numeric_bounds() {
        let def = structure(json!([
            { "name": "year", "type": "numeric", "length": 4, "min": 2024, "max": 2030 }
        ]));
        assert!(SegmentParser::parse("2024", &def).is_ok());
        assert!(SegmentParser::parse("2030", &def).is_ok());
        assert!(SegmentParser::parse("2023", &def).is_err());
        assert!(SegmentParser::parse("2031", &def).is_err());
        assert!(SegmentParser::parse("20a4", &def).is_err());
    }

    #[test]
    fn test_alpha_cases() {
        let upper = structure(json!([{ "name": "s", "type": "alpha", "length": 3, "case": "upper" }]));
        let lower = structure(json!([{ "name": "s", "type": "alpha", "length": 3, "case": "lower" }]));
        let both = structure(json!([{ "name": "s", "type": "alpha", "length": 3 }]));

        assert!(SegmentParser::parse("ABC", &upper).is_ok());
        assert!(SegmentParser::parse("AbC", &upper).is_err());
        assert!(SegmentParser::parse("abc", &lower).is_ok());
        assert!(SegmentParser::parse("aBc", &lower).is_err());
        assert!(SegmentParser::parse("aBc", &both).is_ok());
        assert!(SegmentParser::parse("aB1", &both).is_err());
    }

    #[test]
    fn test_enum_and_alphanumeric() {
        let def = structure(json!([
            { "name": "size", "type": "enum", "length": 1, "values": ["S", "M", "L"] },
            { "name": "id", "type": "alphanumeric", "length": 3 }
        ]));
        assert!(SegmentParser::parse("Ma1b", &def).is_ok());
        assert!(SegmentParser::parse("Xa1b", &def).is_err());
        assert!(SegmentParser::parse("Ma-b", &def).is_err());
    }

    #[test]
    fn test_dates() {
        let ymd = structure(json!([{ "name": "d", "type": "date", "length": 8, "format": "YYYYMMDD" }]));
        assert!(SegmentParser::parse("20240229", &ymd).is_ok());
        assert!(SegmentParser::parse("20230229", &ymd).is_err());
        assert!(SegmentParser::parse("20240230", &ymd).is_err());
        assert!(SegmentParser::parse("20241301", &ymd).is_err());

        let short = structure(json!([{ "name": "d", "type": "date", "length": 6, "format": "YYMMDD" }]));
        assert!(SegmentParser::parse("260131", &short).is_ok());
        assert!(SegmentParser::parse("260231", &short).is_err());

        let julian = structure(json!([{ "name": "d", "type": "date", "length": 5, "format": "YYDDD" }]));
        assert!(SegmentParser::parse("26001", &julian).is_ok());
        assert!(SegmentParser::parse("26366", &julian).is_ok());
        assert!(SegmentParser::parse("26000", &julian).is_err());
        assert!(SegmentParser::parse("26367", &julian).is_err());

        // 长度与格式不一致或格式未知时只做数字校验
        let mismatched = structure(json!([{ "name": "d", "type": "date", "length": 4, "format": "YYYYMMDD" }]));
        assert!(SegmentParser::parse("9999", &mismatched).is_ok());
        let unknown = structure(json!([{ "name": "d", "type": "date", "length": 4, "format": "MMYY" }]));
        assert!(SegmentParser::parse("1399", &unknown).is_ok());
        assert!(SegmentParser::parse("13a9", &unknown).is_err());
    }

    #[test]
    fn test_concat_missing_names_are_empty() {
        let def = structure(json!([
            { "name": "a", "type": "numeric", "length": 2 },
            { "name": "b", "type": "numeric", "length": 2 }
        ]));
        let parsed = SegmentParser::parse("1234", &def).unwrap();
        assert_eq!(parsed.concat(&["b".into(), "zz".into(), "a".into()]), "3412");
    }
}
