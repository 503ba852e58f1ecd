use super::{CheckDigitAlgorithm, CheckDigitError, digits};

/// 数字和模 10
#[derive(Debug, Clone, Copy, Default)]
pub struct Mod10;

impl CheckDigitAlgorithm for Mod10 {
    fn name(&self) -> &'static str {
        "MOD10"
    }

    fn calculate(&self, input: &str) -> Result<String, CheckDigitError> {
        let sum: u32 = digits(input)?.iter().map(|&d| u32::from(d)).sum();
        Ok((sum % 10).to_string())
    }
}
