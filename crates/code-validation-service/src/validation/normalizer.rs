//! 码规范化

use crate::models::CodeRule;

/// 去除首尾空白、删除分隔符字面量，大小写不敏感时转为大写
pub fn normalize(code: &str, rule: &CodeRule) -> String {
    let trimmed = code.trim();

    let stripped = match rule.separator.as_deref() {
        Some(separator) if !separator.is_empty() => trimmed.replace(separator, ""),
        _ => trimmed.to_string(),
    };

    if rule.case_sensitive {
        stripped
    } else {
        stripped.to_uppercase()
    }
}
