use super::{CheckDigitAlgorithm, CheckDigitError, digits};

/// 二面体群 D5 乘法表
const MULTIPLICATION: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const PERMUTATION: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

const INVERSE: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

/// Verhoeff
///
/// 追加占位 0 后自右向左折叠，结果取逆元。
#[derive(Debug, Clone, Copy, Default)]
pub struct Verhoeff;

impl CheckDigitAlgorithm for Verhoeff {
    fn name(&self) -> &'static str {
        "VERHOEFF"
    }

    fn calculate(&self, input: &str) -> Result<String, CheckDigitError> {
        let mut padded = digits(input)?;
        padded.push(0);

        let c = padded
            .iter()
            .rev()
            .enumerate()
            .fold(0u8, |c, (pos, &d)| {
                MULTIPLICATION[c as usize][PERMUTATION[pos % 8][d as usize] as usize]
            });

        Ok(INVERSE[c as usize].to_string())
    }
}
