use super::{CheckDigitAlgorithm, CheckDigitError, digits};

/// Luhn（模 10，隔位加倍）
///
/// 从最右侧开始，偶数下标（0 起）的数字加倍，超过 9 则减 9。
#[derive(Debug, Clone, Copy, Default)]
pub struct Luhn;

impl CheckDigitAlgorithm for Luhn {
    fn name(&self) -> &'static str {
        "LUHN"
    }

    fn calculate(&self, input: &str) -> Result<String, CheckDigitError> {
        let sum: u32 = digits(input)?
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &d)| {
                let d = u32::from(d);
                if i % 2 == 0 {
                    let doubled = d * 2;
                    if doubled > 9 { doubled - 9 } else { doubled }
                } else {
                    d
                }
            })
            .sum();

        Ok(((10 - sum % 10) % 10).to_string())
    }
}
