//! # 谐振子振动波函数矩阵元
//!
//! 计算两个频率不同、平衡位置相差 ΔQ 的一维谐振子之间的坐标矩阵元
//! ⟨χ_m(ω_i; Q)| Q |χ_n(ω_f; Q - ΔQ)⟩。
//!
//! ## 算法概述
//! 1. 归一化 Hermite 函数用稳定的三项递推计算，避免阶乘溢出
//! 2. 在覆盖两个谐振子经典转折点的均匀网格上做梯形积分
//! 3. 矩阵元表示为两个 (能级 × 网格) 表的矩阵乘积
//!
//! ## 依赖关系
//! - 被 `defect/srh.rs` 调用
//! - 使用 `ndarray` 进行矩阵运算

use crate::defect::constants::HBAR_CC;
use crate::error::{DefectError, Result};

use ndarray::{Array1, Array2};

/// 每个振动波长至少的网格点数
const POINTS_PER_NODE: f64 = 10.0;

/// 转折点之外额外覆盖的谐振子长度倍数
const TAIL_LENGTHS: f64 = 6.0;

/// 网格点数上限
const MAX_GRID_POINTS: usize = 200_000;

/// 一维谐振子
#[derive(Debug, Clone, Copy)]
pub struct Oscillator {
    /// ħω (eV)
    pub hbar_omega: f64,
    /// 平衡位置 (amu^1/2 Å)
    pub center: f64,
}

impl Oscillator {
    pub fn new(hbar_omega: f64, center: f64) -> Self {
        Oscillator { hbar_omega, center }
    }

    /// 特征长度 ℓ = sqrt(ħ/ω) (amu^1/2 Å)
    pub fn length(&self) -> f64 {
        HBAR_CC / self.hbar_omega.sqrt()
    }

    /// 第 n 能级的经典转折点离平衡位置的距离
    fn turning_point(&self, n: usize) -> f64 {
        self.length() * ((2 * n + 1) as f64).sqrt()
    }

    /// 在 Q 网格上的前 `levels` 个归一化本征函数，形状 (levels, grid)
    pub fn wavefunctions(&self, levels: usize, grid: &Array1<f64>) -> Array2<f64> {
        let ell = self.length();
        let x = grid.mapv(|q| (q - self.center) / ell);
        let mut table = hermite_functions(levels, &x);
        table.mapv_inplace(|v| v / ell.sqrt());
        table
    }
}

/// 归一化 Hermite 函数 h_n(x)，形状 (levels, len(x))
///
/// h_0 = π^(-1/4) e^(-x²/2)，
/// h_{n+1} = sqrt(2/(n+1)) x h_n - sqrt(n/(n+1)) h_{n-1}
pub fn hermite_functions(levels: usize, x: &Array1<f64>) -> Array2<f64> {
    let mut table = Array2::<f64>::zeros((levels, x.len()));
    if levels == 0 {
        return table;
    }

    let norm0 = std::f64::consts::PI.powf(-0.25);
    for (j, &xj) in x.iter().enumerate() {
        let mut prev = 0.0;
        let mut curr = norm0 * (-0.5 * xj * xj).exp();
        table[[0, j]] = curr;
        for n in 0..levels.saturating_sub(1) {
            let nf = n as f64;
            let next = (2.0 / (nf + 1.0)).sqrt() * xj * curr - (nf / (nf + 1.0)).sqrt() * prev;
            prev = curr;
            curr = next;
            table[[n + 1, j]] = curr;
        }
    }
    table
}

/// 坐标矩阵元 A[m, n] = ⟨χ_m^i| (Q - Q_i) |χ_n^f⟩ (amu^1/2 Å)
pub fn position_matrix(
    initial: &Oscillator,
    final_: &Oscillator,
    ni: usize,
    nf: usize,
) -> Result<Array2<f64>> {
    if !(initial.hbar_omega > 0.0) || !(final_.hbar_omega > 0.0) {
        return Err(DefectError::InvalidArgument(format!(
            "oscillator energies must be positive (got {} and {} eV)",
            initial.hbar_omega, final_.hbar_omega
        )));
    }
    if ni == 0 || nf == 0 {
        return Ok(Array2::zeros((ni, nf)));
    }

    let reach = initial
        .turning_point(ni)
        .max(final_.turning_point(nf))
        + TAIL_LENGTHS * initial.length().max(final_.length());
    let lo = initial.center.min(final_.center) - reach;
    let hi = initial.center.max(final_.center) + reach;

    // 最高能级的节点间距约为 π ℓ / sqrt(2n+1)
    let node_spacing = (initial.length() / ((2 * ni + 1) as f64).sqrt())
        .min(final_.length() / ((2 * nf + 1) as f64).sqrt())
        * std::f64::consts::PI;
    let npts = (((hi - lo) / node_spacing * POINTS_PER_NODE).ceil() as usize + 1)
        .clamp(64, MAX_GRID_POINTS);
    if npts == MAX_GRID_POINTS {
        log::warn!("Vibronic quadrature grid capped at {} points", MAX_GRID_POINTS);
    }

    let dx = (hi - lo) / (npts - 1) as f64;
    let grid = Array1::from_shape_fn(npts, |j| lo + j as f64 * dx);

    // 梯形权重 × (Q - Q_i)
    let weights = Array1::from_shape_fn(npts, |j| {
        let w = if j == 0 || j == npts - 1 { 0.5 * dx } else { dx };
        w * (grid[j] - initial.center)
    });

    let chi_i = initial.wavefunctions(ni, &grid) * &weights;
    let chi_f = final_.wavefunctions(nf, &grid);

    Ok(chi_i.dot(&chi_f.t()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hermite_functions_orthonormal() {
        let dx = 0.01;
        let x = Array1::from_shape_fn(2001, |j| -10.0 + j as f64 * dx);
        let h = hermite_functions(6, &x);
        let gram = h.dot(&h.t()) * dx;
        for m in 0..6 {
            for n in 0..6 {
                let expected = if m == n { 1.0 } else { 0.0 };
                assert!(
                    (gram[[m, n]] - expected).abs() < 1e-8,
                    "<{}|{}> = {}",
                    m,
                    n,
                    gram[[m, n]]
                );
            }
        }
    }

    #[test]
    fn test_position_matrix_identical_oscillators() {
        // ⟨m|Q|n⟩ = ℓ/√2 (√n δ_{m,n-1} + √(n+1) δ_{m,n+1})
        let osc = Oscillator::new(0.05, 0.0);
        let a = position_matrix(&osc, &osc, 4, 4).unwrap();
        let ell = osc.length();

        assert!((a[[0, 1]] - ell / 2.0_f64.sqrt()).abs() < 1e-8 * ell);
        assert!((a[[1, 0]] - ell / 2.0_f64.sqrt()).abs() < 1e-8 * ell);
        assert!((a[[1, 2]] - ell).abs() < 1e-8 * ell);
        assert!(a[[0, 0]].abs() < 1e-8 * ell);
        assert!(a[[0, 2]].abs() < 1e-8 * ell);
    }

    #[test]
    fn test_position_matrix_displaced_ground_state() {
        // ⟨0|Q|0'⟩ for equal frequencies: ΔQ/2 · exp(-ΔQ²/(4ℓ²))
        let dq = 0.3;
        let init = Oscillator::new(0.04, 0.0);
        let fin = Oscillator::new(0.04, dq);
        let a = position_matrix(&init, &fin, 1, 1).unwrap();

        let ell = init.length();
        let expected = 0.5 * dq * (-dq * dq / (4.0 * ell * ell)).exp();
        assert!((a[[0, 0]] - expected).abs() < 1e-8);
    }

    #[test]
    fn test_position_matrix_rejects_nonpositive_energy() {
        let good = Oscillator::new(0.04, 0.0);
        let bad = Oscillator::new(0.0, 0.0);
        assert!(position_matrix(&good, &bad, 2, 2).is_err());
    }
}
