//! # 偶极矩阵元数据模型
//!
//! 光学跃迁矩阵元 ⟨ψ_i|r̂|ψ_j⟩，下标顺序 (band i, band j, k-point, spin, direction)。
//!
//! ## 依赖关系
//! - 被 `parsers/json.rs` 构造
//! - 被 `defect/optics.rs` 使用

use crate::error::{DefectError, Result};

use clap::ValueEnum;
use ndarray::{Array4, Array5};
use num_complex::Complex64;

/// 笛卡尔方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    X,
    Y,
    Z,
}

impl Direction {
    pub fn index(self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
            Direction::Z => 2,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::X => write!(f, "x"),
            Direction::Y => write!(f, "y"),
            Direction::Z => write!(f, "z"),
        }
    }
}

/// 偶极矩阵元集合 (Å)
#[derive(Debug, Clone)]
pub struct DipoleSet {
    data: Array5<Complex64>,
}

impl DipoleSet {
    /// 创建全零矩阵元
    pub fn zeros(nbands: usize, nkpoints: usize, nspins: usize) -> Self {
        DipoleSet {
            data: Array5::zeros((nbands, nbands, nkpoints, nspins, 3)),
        }
    }

    /// (nbands, nkpoints, nspins)
    pub fn shape(&self) -> (usize, usize, usize) {
        let (nb, _, nk, ns, _) = self.data.dim();
        (nb, nk, ns)
    }

    /// 设置单个跃迁的三个方向分量
    pub fn set(
        &mut self,
        band_i: usize,
        band_j: usize,
        kpoint: usize,
        spin: usize,
        value: [Complex64; 3],
    ) -> Result<()> {
        let (nb, nk, ns) = self.shape();
        if band_i >= nb || band_j >= nb || kpoint >= nk || spin >= ns {
            return Err(DefectError::IndexOutOfRange(format!(
                "dipole element ({}, {}, k {}, spin {}) outside shape ({}, {}, {})",
                band_i, band_j, kpoint, spin, nb, nk, ns
            )));
        }
        for (d, v) in value.iter().enumerate() {
            self.data[[band_i, band_j, kpoint, spin, d]] = *v;
        }
        Ok(())
    }

    pub fn get(
        &self,
        band_i: usize,
        band_j: usize,
        kpoint: usize,
        spin: usize,
        dir: Direction,
    ) -> Complex64 {
        self.data[[band_i, band_j, kpoint, spin, dir.index()]]
    }

    /// 按跃迁掩码清零矩阵元，掩码形状 (nbands, nbands, nkpoints, nspins)
    pub fn masked(&self, mask: &Array4<bool>) -> Result<DipoleSet> {
        let (nb, nk, ns) = self.shape();
        if mask.dim() != (nb, nb, nk, ns) {
            return Err(DefectError::InvalidData(format!(
                "transition mask shape {:?} does not match dipoles ({}, {}, {}, {})",
                mask.dim(),
                nb,
                nb,
                nk,
                ns
            )));
        }
        let mut data = self.data.clone();
        for ((i, j, k, s, _), value) in data.indexed_iter_mut() {
            if !mask[[i, j, k, s]] {
                *value = Complex64::new(0.0, 0.0);
            }
        }
        Ok(DipoleSet { data })
    }
}
