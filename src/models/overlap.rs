//! # 波函数交叠矩阵数据模型
//!
//! 有限位移计算的交叠矩阵 ⟨ψ_f(Q)|S|ψ_i(0)⟩，按 (畸变步, spin, k-point) 索引。
//! 行下标是位移结构上的能带 f，列下标是参考结构上的能带 i。
//!
//! ## 依赖关系
//! - 被 `parsers/json.rs` 构造
//! - 被 `defect/elph.rs` 使用

use crate::error::{DefectError, Result};
use crate::models::Spin;

use ndarray::Array2;
use num_complex::Complex64;
use std::collections::BTreeMap;

/// 交叠矩阵集合
#[derive(Debug, Clone, Default)]
pub struct OverlapSet {
    matrices: BTreeMap<(usize, Spin, usize), Array2<Complex64>>,
}

impl OverlapSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个畸变步上的交叠矩阵
    pub fn insert(
        &mut self,
        step: usize,
        spin: Spin,
        kpoint: usize,
        matrix: Array2<Complex64>,
    ) -> Result<()> {
        let (nrow, ncol) = matrix.dim();
        if nrow != ncol {
            return Err(DefectError::InvalidData(format!(
                "overlap matrix for step {} is {}x{}, expected square",
                step, nrow, ncol
            )));
        }
        if let Some(nb) = self.nbands() {
            if nb != nrow {
                return Err(DefectError::InvalidData(format!(
                    "overlap matrix for step {} has {} bands, others have {}",
                    step, nrow, nb
                )));
            }
        }
        if self.matrices.insert((step, spin, kpoint), matrix).is_some() {
            return Err(DefectError::InvalidData(format!(
                "duplicate overlap matrix for step {}, spin {}, k-point {}",
                step, spin, kpoint
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// 矩阵维度（能带数）
    pub fn nbands(&self) -> Option<usize> {
        self.matrices.values().next().map(|m| m.nrows())
    }

    /// 所有出现过的畸变步下标（升序）
    pub fn steps(&self) -> Vec<usize> {
        let mut steps: Vec<usize> = self.matrices.keys().map(|(s, _, _)| *s).collect();
        steps.dedup();
        steps
    }

    pub fn matrix(&self, step: usize, kpoint: usize, spin: Spin) -> Option<&Array2<Complex64>> {
        self.matrices.get(&(step, spin, kpoint))
    }
}
