//! 校验位算法库
//!
//! 内置算法均为无状态单元结构体，通过 `algorithm_for` 对封闭的 `CheckAlgorithm` 穷尽分派；
//! CUSTOM 依赖规则携带的表达式，需经 `CustomCheckRunner` 在受限环境中执行。
//!
//! 所有算法满足：`validate(x, d) == (calculate(x) == Ok(d))`，
//! 无法处理的输入（数字算法遇到非数字字符）使 `calculate` 返回错误、`validate` 返回 false。

pub mod custom;
mod damm;
mod luhn;
mod mod10;
mod mod11;
mod mod97;
mod verhoeff;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub use custom::{CustomCheckError, CustomCheckFunction, CustomCheckRunner};
pub use damm::Damm;
pub use luhn::Luhn;
pub use mod10::Mod10;
pub use mod11::Mod11;
pub use mod97::Mod97;
pub use verhoeff::Verhoeff;

use crate::models::CheckAlgorithm;

/// 内置算法错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckDigitError {
    #[error("位置 {position} 的字符 {ch:?} 不是数字")]
    NonDigit { ch: char, position: usize },

    #[error("CUSTOM 算法需要规则提供校验表达式")]
    CustomRequiresDefinition,
}

/// 校验位算法
pub trait CheckDigitAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    fn calculate(&self, input: &str) -> Result<String, CheckDigitError>;

    fn validate(&self, input: &str, check: &str) -> bool {
        self.calculate(input).is_ok_and(|expected| expected == check)
    }
}

/// 内置算法查表；CUSTOM 没有内置实现
pub fn algorithm_for(algorithm: CheckAlgorithm) -> Option<&'static dyn CheckDigitAlgorithm> {
    match algorithm {
        CheckAlgorithm::Luhn => Some(&Luhn),
        CheckAlgorithm::Mod10 => Some(&Mod10),
        CheckAlgorithm::Mod11 => Some(&Mod11),
        CheckAlgorithm::Mod97 => Some(&Mod97),
        CheckAlgorithm::Verhoeff => Some(&Verhoeff),
        CheckAlgorithm::Damm => Some(&Damm),
        CheckAlgorithm::Custom => None,
    }
}

/// 将输入解析为十进制数字序列
pub(crate) fn digits(input: &str) -> Result<Vec<u8>, CheckDigitError> {
    input
        .chars()
        .enumerate()
        .map(|(position, ch)| {
            ch.to_digit(10)
                .map(|d| d as u8)
                .ok_or(CheckDigitError::NonDigit { ch, position })
        })
        .collect()
}

/// 校验位注册表
///
/// 内置算法同步计算；CUSTOM 交给受限执行器，任何错误或超时都视为校验失败。
#[derive(Debug, Clone, Default)]
pub struct CheckDigitRegistry {
    custom: CustomCheckRunner,
}

impl CheckDigitRegistry {
    pub fn new(custom: CustomCheckRunner) -> Self {
        Self { custom }
    }

    /// 计算内置算法的校验位
    pub fn calculate(
        &self,
        algorithm: CheckAlgorithm,
        input: &str,
    ) -> Result<String, CheckDigitError> {
        algorithm_for(algorithm)
            .ok_or(CheckDigitError::CustomRequiresDefinition)?
            .calculate(input)
    }

    /// 校验 `check` 是否为 `input` 在给定算法下的校验值
    pub async fn verify(
        &self,
        algorithm: CheckAlgorithm,
        input: &str,
        check: &str,
        custom_definition: Option<&Value>,
    ) -> bool {
        match algorithm_for(algorithm) {
            Some(builtin) => builtin.validate(input, check),
            None => match custom_definition {
                Some(definition) => self.custom.verify(definition, input, check).await,
                None => {
                    warn!("CUSTOM check algorithm without a check function, rejecting");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 各算法对同一组输入的期望校验值（与参考实现交叉核对）
    const VECTORS: &[(&str, [&str; 6])] = &[
        // input,        luhn, mod10, mod11, mod97, verhoeff, damm
        ("7992739871", ["3", "2", "6", "87", "8", "1"]),
        ("1234567890", ["3", "5", "3", "96", "2", "6"]),
        ("10012345", ["4", "6", "2", "93", "7", "2"]),
        ("236", ["0", "1", "4", "56", "3", "1"]),
        ("572", ["8", "4", "0", "11", "7", "4"]),
        ("12345", ["5", "5", "5", "72", "1", "9"]),
        ("0", ["0", "0", "0", "98", "4", "0"]),
        ("123456789", ["7", "5", "2", "59", "0", "4"]),
        ("2026", ["3", "0", "5", "12", "4", "5"]),
        ("98765432", ["4", "4", "5", "66", "9", "9"]),
    ];

    const ORDER: [CheckAlgorithm; 6] = [
        CheckAlgorithm::Luhn,
        CheckAlgorithm::Mod10,
        CheckAlgorithm::Mod11,
        CheckAlgorithm::Mod97,
        CheckAlgorithm::Verhoeff,
        CheckAlgorithm::Damm,
    ];

    #[test]
    fn test_known_vectors() {
        for (input, expected) in VECTORS {
            for (alg, want) in ORDER.iter().zip(expected.iter()) {
                let got = algorithm_for(*alg).unwrap().calculate(input).unwrap();
                assert_eq!(&got, want, "{} of {}", alg, input);
            }
        }
    }

    #[test]
    fn test_validate_agrees_with_calculate() {
        // 对一批输入，calculate 的结果必然通过 validate，其余候选值必然失败
        let inputs: Vec<String> = (0..200u64)
            .map(|i| (i * 7_919 + 13).to_string())
            .chain(VECTORS.iter().map(|(s, _)| s.to_string()))
            .collect();

        for alg in ORDER {
            let algo = algorithm_for(alg).unwrap();
            for input in &inputs {
                let check = algo.calculate(input).unwrap();
                assert!(algo.validate(input, &check), "{} {}", alg, input);

                let width = check.len();
                for candidate in 0..10u32.pow(width as u32) {
                    let candidate = format!("{:0width$}", candidate, width = width);
                    if candidate != check {
                        assert!(!algo.validate(input, &candidate), "{} {}", alg, input);
                    }
                }
            }
        }
    }

    #[test]
    fn test_numeric_algorithms_reject_letters() {
        for alg in [
            CheckAlgorithm::Luhn,
            CheckAlgorithm::Mod10,
            CheckAlgorithm::Mod11,
            CheckAlgorithm::Verhoeff,
            CheckAlgorithm::Damm,
        ] {
            let algo = algorithm_for(alg).unwrap();
            assert_eq!(
                algo.calculate("12A4"),
                Err(CheckDigitError::NonDigit {
                    ch: 'A',
                    position: 2
                })
            );
            assert!(!algo.validate("12A4", "0"));
        }
    }

    #[test]
    fn test_custom_has_no_builtin() {
        assert!(algorithm_for(CheckAlgorithm::Custom).is_none());
        let registry = CheckDigitRegistry::default();
        assert_eq!(
            registry.calculate(CheckAlgorithm::Custom, "123"),
            Err(CheckDigitError::CustomRequiresDefinition)
        );
    }

    #[tokio::test]
    async fn test_registry_verify_builtin_and_custom() {
        let registry = CheckDigitRegistry::default();
        assert!(
            registry
                .verify(CheckAlgorithm::Luhn, "7992739871", "3", None)
                .await
        );
        assert!(
            !registry
                .verify(CheckAlgorithm::Luhn, "7992739871", "5", None)
                .await
        );

        // CUSTOM 缺少表达式时拒绝
        assert!(
            !registry
                .verify(CheckAlgorithm::Custom, "123", "6", None)
                .await
        );

        let digit_sum = json!({ "expression": { "op": "mod", "left": { "op": "digit_sum" }, "right": { "op": "const", "value": 10 } } });
        assert!(
            registry
                .verify(CheckAlgorithm::Custom, "123", "6", Some(&digit_sum))
                .await
        );
    }
}
