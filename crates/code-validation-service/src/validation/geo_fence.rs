//! 地域限制

use serde_json::json;

use super::Rejection;
use crate::models::{CodeRule, ErrorCode};

/// 规则未限制国家时放行；否则要求提供国家码且在允许列表内（忽略大小写）
pub fn validate_geo_fence(rule: &CodeRule, country: Option<&str>) -> Result<(), Rejection> {
    if rule.allowed_countries.is_empty() {
        return Ok(());
    }

    let country = country
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());

    let allowed = country.as_deref().is_some_and(|c| {
        rule.allowed_countries
            .iter()
            .any(|a| a.trim().eq_ignore_ascii_case(c))
    });

    if allowed {
        Ok(())
    } else {
        Err(
            Rejection::new(ErrorCode::GeoBlocked, "Code is not valid in this country")
                .with_details(json!({
                    "country": country,
                    "allowedCountries": rule.allowed_countries,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::rule_with;

    #[test]
    fn test_unrestricted_rule_accepts_anything() {
        let rule = rule_with(|r| r.allowed_countries = vec![]);
        assert!(validate_geo_fence(&rule, None).is_ok());
        assert!(validate_geo_fence(&rule, Some("US")).is_ok());
    }

    #[test]
    fn test_restricted_rule() {
        let rule = rule_with(|r| r.allowed_countries = vec!["ES".into(), "PT".into()]);

        assert!(validate_geo_fence(&rule, Some("ES")).is_ok());
        assert!(validate_geo_fence(&rule, Some(" es ")).is_ok());

        for country in [Some("US"), None, Some("  ")] {
            let err = validate_geo_fence(&rule, country).unwrap_err();
            assert_eq!(err.code, ErrorCode::GeoBlocked);
        }
    }
}
