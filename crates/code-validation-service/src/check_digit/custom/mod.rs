//! CUSTOM 校验位：受限执行
//!
//! 规则中的 `custom_check_function` 是一段 JSON 表达式定义：
//!
//! ```json
//! {
//!   "expression": { "op": "mod", "left": { "op": "digit_sum" }, "right": { "op": "const", "value": 10 } },
//!   "width": 1,
//!   "symbols": { "10": "X" }
//! }
//! ```
//!
//! 求值在阻塞线程池中进行，同时受步数预算和墙钟超时约束；
//! 解析失败、运算错误、超预算或超时都视为校验失败，不会变成服务端错误。

mod expr;

pub use expr::{Comparison, Direction, Evaluator, Expr, MAX_DEPTH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// 自定义校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomCheckError {
    #[error("校验表达式无效: {0}")]
    Invalid(String),

    #[error("校验表达式嵌套过深: {depth} > {max}")]
    TooDeep { depth: usize, max: usize },

    #[error("位置 {position} 的字符 {ch:?} 无法参与计算")]
    UnsupportedCharacter { ch: char, position: usize },

    #[error("除数为 0")]
    DivisionByZero,

    #[error("整数溢出")]
    Overflow,

    #[error("求值步数超出预算 {0}")]
    BudgetExceeded(u64),

    #[error("结果 {0} 为负且无符号映射")]
    NegativeResult(i64),

    #[error("执行超时 ({0:?})")]
    Timeout(Duration),

    #[error("执行线程异常: {0}")]
    Worker(String),
}

/// 自定义校验函数定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCheckFunction {
    pub expression: Expr,
    /// 数值结果补零宽度
    #[serde(default)]
    pub width: Option<usize>,
    /// 结果到符号的映射（如 10 -> "X"），键为十进制字符串
    #[serde(default)]
    pub symbols: BTreeMap<String, String>,
}

impl CustomCheckFunction {
    /// 解析并检查嵌套深度
    pub fn parse(definition: &Value) -> Result<Self, CustomCheckError> {
        let function: Self = serde_json::from_value(definition.clone())
            .map_err(|e| CustomCheckError::Invalid(e.to_string()))?;

        let depth = function.expression.depth();
        if depth > MAX_DEPTH {
            return Err(CustomCheckError::TooDeep {
                depth,
                max: MAX_DEPTH,
            });
        }
        Ok(function)
    }

    /// 在步数预算内计算校验值
    pub fn calculate(&self, input: &str, max_steps: u64) -> Result<String, CustomCheckError> {
        let mut evaluator = Evaluator::new(input, max_steps);
        let value = evaluator.eval(&self.expression)?;
        self.render(value)
    }

    fn render(&self, value: i64) -> Result<String, CustomCheckError> {
        if let Some(symbol) = self.symbols.get(&value.to_string()) {
            return Ok(symbol.clone());
        }
        if value < 0 {
            return Err(CustomCheckError::NegativeResult(value));
        }
        let width = self.width.unwrap_or(1);
        Ok(format!("{:0width$}", value, width = width))
    }
}

/// 受限执行器
#[derive(Debug, Clone)]
pub struct CustomCheckRunner {
    timeout: Duration,
    max_steps: u64,
}

impl Default for CustomCheckRunner {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            max_steps: 10_000,
        }
    }
}

impl CustomCheckRunner {
    pub fn new(timeout: Duration, max_steps: u64) -> Self {
        Self { timeout, max_steps }
    }

    /// 计算校验值：阻塞线程池 + 墙钟超时
    pub async fn calculate(&self, definition: &Value, input: &str) -> Result<String, CustomCheckError> {
        let function = CustomCheckFunction::parse(definition)?;
        let input = input.to_string();
        let max_steps = self.max_steps;

        let task = tokio::task::spawn_blocking(move || function.calculate(&input, max_steps));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(CustomCheckError::Worker(join_error.to_string())),
            Err(_) => Err(CustomCheckError::Timeout(self.timeout)),
        }
    }

    /// 校验；任何错误都判为不通过
    pub async fn verify(&self, definition: &Value, input: &str, check: &str) -> bool {
        let started = Instant::now();
        match self.calculate(definition, input).await {
            Ok(expected) => {
                debug!(
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Custom check function evaluated"
                );
                expected == check
            }
            Err(e) => {
                warn!(error = %e, "Custom check function failed, rejecting code");
                false
            }
        }
    }
}
