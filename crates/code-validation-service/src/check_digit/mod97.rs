use super::{CheckDigitAlgorithm, CheckDigitError};

/// ISO 7064 MOD 97-10 风格的两位校验
///
/// 字母 A-Z 映射为 10-35，其他非字母数字字符忽略；对所得十进制串取模 97，
/// 校验值为 98 - 余数，补零到两位。余数为 0 时结果为 "98"。
#[derive(Debug, Clone, Copy, Default)]
pub struct Mod97;

impl CheckDigitAlgorithm for Mod97 {
    fn name(&self) -> &'static str {
        "MOD97"
    }

    fn calculate(&self, input: &str) -> Result<String, CheckDigitError> {
        // 逐位折叠取模，避免大整数
        let remainder = input
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .fold(0u32, |r, c| match c {
                '0'..='9' => (r * 10 + (c as u32 - '0' as u32)) % 97,
                'A'..='Z' => (r * 100 + (c as u32 - 'A' as u32 + 10)) % 97,
                _ => r,
            });

        Ok(format!("{:02}", 98 - remainder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod97_alphanumeric() {
        assert_eq!(Mod97.calculate("ABCD1234").unwrap(), "49");
        assert_eq!(Mod97.calculate("DN2026").unwrap(), "36");
        assert_eq!(Mod97.calculate("ABC").unwrap(), "60");
    }

    #[test]
    fn test_mod97_zero_remainder_yields_98() {
        assert_eq!(Mod97.calculate("0").unwrap(), "98");
        assert_eq!(Mod97.calculate("97").unwrap(), "98");
    }

    #[test]
    fn test_mod97_ignores_separators_and_case() {
        assert_eq!(
            Mod97.calculate("abcd-1234").unwrap(),
            Mod97.calculate("ABCD1234").unwrap()
        );
    }
}
