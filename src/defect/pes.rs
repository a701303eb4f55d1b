//! # 谐振势能面拟合
//!
//! 最小二乘拟合 E(Q) = E0 + ½ω²(Q - Q0)²。
//!
//! ## 算法概述
//! 1. 以 Q 的平均值为中心做二次多项式最小二乘（正规方程）
//! 2. 二次项系数 a 必须为正，否则势能面非物理
//! 3. ω = √(2a)，Q0 与 E0 由顶点给出
//!
//! ## 依赖关系
//! - 被 `defect/harmonic.rs` 调用
//! - 使用 `defect/constants.rs`

use crate::defect::constants::HBAR_CC;
use crate::error::{DefectError, Result};

/// 判定两个 Q 相同的容差 (amu^1/2 Å)
const DISTINCT_Q_TOL: f64 = 1e-10;

/// 谐振拟合结果
#[derive(Debug, Clone, Copy)]
pub struct HarmonicFit {
    /// ω (eV^1/2 amu^-1/2 Å^-1)
    pub omega: f64,
    /// 势能面最低点能量 (eV)
    pub e0: f64,
    /// 势能面最低点位置 (amu^1/2 Å)
    pub q0: f64,
    /// 拟合残差均方根 (eV)
    pub rms_residual: f64,
}

impl HarmonicFit {
    /// ħω (eV)
    pub fn hbar_omega(&self) -> f64 {
        HBAR_CC * self.omega
    }

    /// 拟合抛物线在 Q 处的能量
    pub fn energy_at(&self, q: f64) -> f64 {
        self.e0 + 0.5 * self.omega * self.omega * (q - self.q0).powi(2)
    }
}

/// 对 (Q, E) 样本做谐振拟合
pub fn fit_harmonic(samples: &[(f64, f64)]) -> Result<HarmonicFit> {
    let distinct = count_distinct(samples.iter().map(|(q, _)| *q));
    if distinct < 3 {
        return Err(DefectError::TooFewSamples { found: distinct });
    }

    let n = samples.len() as f64;
    let q_mean = samples.iter().map(|(q, _)| q).sum::<f64>() / n;

    // 正规方程的幂和
    let mut s = [0.0_f64; 5];
    let mut t = [0.0_f64; 3];
    for &(q, e) in samples {
        let x = q - q_mean;
        let mut xp = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += xp;
            if k < 3 {
                t[k] += xp * e;
            }
            xp *= x;
        }
    }

    let matrix = [[s[4], s[3], s[2]], [s[3], s[2], s[1]], [s[2], s[1], s[0]]];
    let [a, b, c] = solve3(matrix, [t[2], t[1], t[0]])?;

    if !(a > 0.0) {
        return Err(DefectError::UnphysicalPes { curvature: 2.0 * a });
    }

    let omega = (2.0 * a).sqrt();
    let q0 = q_mean - b / (2.0 * a);
    let e0 = c - b * b / (4.0 * a);

    let fit = HarmonicFit {
        omega,
        e0,
        q0,
        rms_residual: 0.0,
    };
    let rms = (samples
        .iter()
        .map(|&(q, e)| (fit.energy_at(q) - e).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    log::debug!(
        "Harmonic fit: omega = {:.6}, hbar*omega = {:.6} eV, Q0 = {:.6}, E0 = {:.6}, rms = {:.3e}",
        omega,
        fit.hbar_omega(),
        q0,
        e0,
        rms
    );

    Ok(HarmonicFit {
        rms_residual: rms,
        ..fit
    })
}

/// 不同 Q 值的个数
fn count_distinct(values: impl Iterator<Item = f64>) -> usize {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup_by(|a, b| (*a - *b).abs() <= DISTINCT_Q_TOL);
    sorted.len()
}

/// 3x3 线性方程组（部分主元高斯消元）
fn solve3(mut m: [[f64; 3]; 3], mut rhs: [f64; 3]) -> Result<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < 1e-300 {
            return Err(DefectError::InvalidData(
                "singular normal equations in harmonic fit".to_string(),
            ));
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in (col + 1)..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_three_point_fit() {
        let samples = [(-0.1, 0.10), (0.0, 0.0), (0.1, 0.10)];
        let fit = fit_harmonic(&samples).unwrap();

        assert!(fit.omega > 0.0);
        assert!((0.5 * fit.omega * fit.omega * 0.01 - 0.10).abs() < 1e-10);
        assert!(fit.q0.abs() < 1e-12);
        assert!(fit.e0.abs() < 1e-12);
    }

    #[test]
    fn test_fit_reconstructs_samples() {
        // E = 0.3 + 0.5 * 4.0 * (Q - 0.2)^2
        let samples: Vec<(f64, f64)> = [-0.4, -0.2, 0.0, 0.1, 0.3, 0.6]
            .iter()
            .map(|&q| (q, 0.3 + 2.0 * (q - 0.2_f64).powi(2)))
            .collect();
        let fit = fit_harmonic(&samples).unwrap();

        assert!((fit.omega - 2.0).abs() < 1e-9);
        assert!((fit.q0 - 0.2).abs() < 1e-9);
        assert!((fit.e0 - 0.3).abs() < 1e-9);
        for (q, e) in &samples {
            assert!((fit.energy_at(*q) - e).abs() < 1e-9);
        }
        assert!(fit.rms_residual < 1e-9);
    }

    #[test]
    fn test_unphysical_curvature() {
        let samples = [(-0.1, -0.10), (0.0, 0.0), (0.1, -0.10)];
        assert!(matches!(
            fit_harmonic(&samples),
            Err(DefectError::UnphysicalPes { .. })
        ));
    }

    #[test]
    fn test_flat_pes_is_unphysical() {
        let samples = [(-0.1, 1.0), (0.0, 1.0), (0.1, 1.0)];
        assert!(matches!(
            fit_harmonic(&samples),
            Err(DefectError::UnphysicalPes { .. })
        ));
    }

    #[test]
    fn test_too_few_distinct_samples() {
        let samples = [(0.0, 0.0), (0.1, 0.1), (0.1, 0.1)];
        assert!(matches!(
            fit_harmonic(&samples),
            Err(DefectError::TooFewSamples { found: 2 })
        ));
    }

    #[test]
    fn test_hbar_omega_units() {
        let fit = HarmonicFit {
            omega: 1.0,
            e0: 0.0,
            q0: 0.0,
            rms_residual: 0.0,
        };
        assert!((fit.hbar_omega() - 0.0646541).abs() < 1e-6);
    }
}
