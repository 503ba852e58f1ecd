//! 自定义校验表达式
//!
//! 受限的声明式表达式语言：只有整数运算、对输入字符的有限遍历和条件分支，
//! 没有 I/O、没有宿主绑定、没有循环，求值由步数预算约束。

use serde::{Deserialize, Serialize};

use super::CustomCheckError;

/// 表达式最大嵌套深度
pub const MAX_DEPTH: usize = 32;

/// 表达式节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    /// 整数常量
    Const { value: i64 },
    /// 输入字符数
    Length,
    /// 字符值之和（0-9 为数值，A-Z 为 10-35）
    DigitSum,
    /// 加权和，权重循环使用
    WeightedSum {
        weights: Vec<i64>,
        #[serde(default)]
        direction: Direction,
        /// 乘积大于 9 时减 9（Luhn 式折叠）
        #[serde(default)]
        fold_products: bool,
    },
    /// 将整个输入视为十进制大数（字母展开为两位）后取模
    NumericMod { modulus: i64 },
    Add { args: Vec<Expr> },
    Mul { args: Vec<Expr> },
    Sub { left: Box<Expr>, right: Box<Expr> },
    /// 非负取模
    Mod { left: Box<Expr>, right: Box<Expr> },
    When {
        left: Box<Expr>,
        cmp: Comparison,
        right: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LeftToRight,
    #[default]
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn apply(&self, left: i64, right: i64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }
}

impl Expr {
    /// 嵌套深度（叶子为 1）
    pub fn depth(&self) -> usize {
        let children = match self {
            Self::Const { .. }
            | Self::Length
            | Self::DigitSum
            | Self::WeightedSum { .. }
            | Self::NumericMod { .. } => return 1,
            Self::Add { args } | Self::Mul { args } => args.iter().map(Expr::depth).max(),
            Self::Sub { left, right } | Self::Mod { left, right } => {
                Some(left.depth().max(right.depth()))
            }
            Self::When {
                left,
                right,
                then,
                otherwise,
                ..
            } => [left, right, then, otherwise].iter().map(|e| e.depth()).max(),
        };
        1 + children.unwrap_or(0)
    }
}

/// 字符值：数字 0-9，字母 10-35
fn char_value(c: char, position: usize) -> Result<i64, CustomCheckError> {
    match c.to_ascii_uppercase() {
        d @ '0'..='9' => Ok(i64::from(d as u8 - b'0')),
        a @ 'A'..='Z' => Ok(i64::from(a as u8 - b'A') + 10),
        _ => Err(CustomCheckError::UnsupportedCharacter { ch: c, position }),
    }
}

/// 带步数预算的求值器
pub struct Evaluator {
    chars: Vec<char>,
    steps: u64,
    max_steps: u64,
}

impl Evaluator {
    pub fn new(input: &str, max_steps: u64) -> Self {
        Self {
            chars: input.chars().collect(),
            steps: 0,
            max_steps,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn tick(&mut self, cost: u64) -> Result<(), CustomCheckError> {
        self.steps = self.steps.saturating_add(cost);
        if self.steps > self.max_steps {
            Err(CustomCheckError::BudgetExceeded(self.max_steps))
        } else {
            Ok(())
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<i64, CustomCheckError> {
        self.tick(1)?;
        match expr {
            Expr::Const { value } => Ok(*value),
            Expr::Length => Ok(self.chars.len() as i64),
            Expr::DigitSum => {
                self.tick(self.chars.len() as u64)?;
                self.chars
                    .iter()
                    .enumerate()
                    .try_fold(0i64, |acc, (i, &c)| {
                        acc.checked_add(char_value(c, i)?)
                            .ok_or(CustomCheckError::Overflow)
                    })
            }
            Expr::WeightedSum {
                weights,
                direction,
                fold_products,
            } => self.weighted_sum(weights, *direction, *fold_products),
            Expr::NumericMod { modulus } => self.numeric_mod(*modulus),
            Expr::Add { args } => args.iter().try_fold(0i64, |acc, e| {
                let v = self.eval(e)?;
                acc.checked_add(v).ok_or(CustomCheckError::Overflow)
            }),
            Expr::Mul { args } => args.iter().try_fold(1i64, |acc, e| {
                let v = self.eval(e)?;
                acc.checked_mul(v).ok_or(CustomCheckError::Overflow)
            }),
            Expr::Sub { left, right } => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                l.checked_sub(r).ok_or(CustomCheckError::Overflow)
            }
            Expr::Mod { left, right } => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                if r == 0 {
                    return Err(CustomCheckError::DivisionByZero);
                }
                l.checked_rem_euclid(r).ok_or(CustomCheckError::Overflow)
            }
            Expr::When {
                left,
                cmp,
                right,
                then,
                otherwise,
            } => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                if cmp.apply(l, r) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn weighted_sum(
        &mut self,
        weights: &[i64],
        direction: Direction,
        fold_products: bool,
    ) -> Result<i64, CustomCheckError> {
        if weights.is_empty() {
            return Err(CustomCheckError::Invalid("weighted_sum 需要至少一个权重".into()));
        }
        self.tick(self.chars.len() as u64)?;

        let indexed: Vec<(usize, char)> = match direction {
            Direction::LeftToRight => self.chars.iter().copied().enumerate().collect(),
            Direction::RightToLeft => self.chars.iter().rev().copied().enumerate().collect(),
        };

        let len = self.chars.len();
        indexed.into_iter().try_fold(0i64, |acc, (i, c)| {
            let position = match direction {
                Direction::LeftToRight => i,
                Direction::RightToLeft => len - 1 - i,
            };
            let mut product = char_value(c, position)?
                .checked_mul(weights[i % weights.len()])
                .ok_or(CustomCheckError::Overflow)?;
            if fold_products && product > 9 {
                product -= 9;
            }
            acc.checked_add(product).ok_or(CustomCheckError::Overflow)
        })
    }

    fn numeric_mod(&mut self, modulus: i64) -> Result<i64, CustomCheckError> {
        if modulus <= 0 {
            return Err(CustomCheckError::DivisionByZero);
        }
        self.tick(self.chars.len() as u64)?;

        let m = i128::from(modulus);
        let mut remainder: i128 = 0;
        for (i, &c) in self.chars.iter().enumerate() {
            let v = i128::from(char_value(c, i)?);
            let scale = if v >= 10 { 100 } else { 10 };
            remainder = (remainder * scale + v) % m;
        }
        // remainder < modulus <= i64::MAX
        Ok(remainder as i64)
    }
}
