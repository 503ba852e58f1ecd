use super::{CheckDigitAlgorithm, CheckDigitError, digits};

/// 加权模 11
///
/// 权重 2..=7 从最右侧数字开始循环；余数为 0 或 1 时校验位为 "0"，否则为 11 - 余数。
#[derive(Debug, Clone, Copy, Default)]
pub struct Mod11;

impl CheckDigitAlgorithm for Mod11 {
    fn name(&self) -> &'static str {
        "MOD11"
    }

    fn calculate(&self, input: &str) -> Result<String, CheckDigitError> {
        let sum: u64 = digits(input)?
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &d)| u64::from(d) * (2 + (i as u64 % 6)))
            .sum();

        let check = match sum % 11 {
            0 | 1 => 0,
            r => 11 - r,
        };
        Ok(check.to_string())
    }
}
