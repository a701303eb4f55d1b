//! # 电声耦合矩阵元
//!
//! W_if = (ε_i - ε_f) · d⟨ψ_f|S|ψ_i⟩/dQ
//!
//! ## 算法概述
//! 1. 收集每个畸变步在缺陷态 (k-point, spin) 上的交叠矩阵
//! 2. 位移关于零点对称时用最小对称位移做中心差分，否则对所有步做线性最小二乘斜率
//! 3. 斜率乘以缺陷态与其它态的本征值差
//!
//! ## 依赖关系
//! - 被 `defect/srh.rs` 和 `commands/elph.rs` 调用
//! - 使用 `defect/harmonic.rs` 的 HarmonicDefect

use crate::defect::harmonic::{HarmonicDefect, Stage};
use crate::error::{DefectError, Result};
use crate::models::BandIndex;

use clap::ValueEnum;
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 判定位移相同或为零的容差 (amu^1/2 Å)
const DISPLACEMENT_TOL: f64 = 1e-8;

/// 交叠矩阵的相位约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseConvention {
    /// 直接使用复数交叠
    Raw,
    /// |w|·sign(Re w)，去掉波函数的任意整体相位
    #[default]
    MagnitudeSign,
}

impl PhaseConvention {
    fn apply(self, w: Complex64) -> Complex64 {
        match self {
            PhaseConvention::Raw => w,
            PhaseConvention::MagnitudeSign => {
                let sign = if w.re < 0.0 { -1.0 } else { 1.0 };
                Complex64::new(w.norm() * sign, 0.0)
            }
        }
    }
}

impl std::fmt::Display for PhaseConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseConvention::Raw => write!(f, "raw"),
            PhaseConvention::MagnitudeSign => write!(f, "magnitude-sign"),
        }
    }
}

/// 导数估计方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivativeMethod {
    /// (M(+h) - M(-h)) / 2h
    Central { step: f64 },
    /// 所有步的线性最小二乘斜率
    LeastSquares { points: usize },
}

impl std::fmt::Display for DerivativeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DerivativeMethod::Central { step } => write!(f, "central difference (h = {:.4})", step),
            DerivativeMethod::LeastSquares { points } => {
                write!(f, "least-squares slope ({} points)", points)
            }
        }
    }
}

/// 电声耦合计算结果
#[derive(Debug, Clone)]
pub struct ElphResult {
    /// 缺陷态 i
    pub defect_state: BandIndex,
    /// 其它能带 f → W_if (eV amu^-1/2 Å^-1)
    pub elements: BTreeMap<usize, Complex64>,
    pub method: DerivativeMethod,
}

impl ElphResult {
    /// 指定能带集合上 |W_if| 的平均值
    pub fn mean_magnitude(&self, bands: &[usize]) -> Result<f64> {
        if bands.is_empty() {
            return Err(DefectError::InvalidArgument(
                "empty band selection for electron-phonon average".to_string(),
            ));
        }
        let mut sum = 0.0;
        for band in bands {
            let w = self.elements.get(band).ok_or_else(|| {
                DefectError::IndexOutOfRange(format!(
                    "no electron-phonon element for band {} (defect state {})",
                    band, self.defect_state
                ))
            })?;
            sum += w.norm();
        }
        Ok(sum / bands.len() as f64)
    }
}

/// 单个矩阵元 W_if = (ε_i - ε_f) · slope
pub fn matrix_element(eps_i: f64, eps_f: f64, slope: Complex64) -> Complex64 {
    slope * (eps_i - eps_f)
}

/// 交叠矩阵对 Q 的导数
///
/// `samples` 为 (Q, 矩阵) 对，Q 相对参考结构。
pub fn overlap_slope(
    samples: &[(f64, &Array2<Complex64>)],
    phase: PhaseConvention,
) -> Result<(Array2<Complex64>, DerivativeMethod)> {
    let mut nonzero: Vec<f64> = samples
        .iter()
        .map(|(q, _)| *q)
        .filter(|q| q.abs() > DISPLACEMENT_TOL)
        .collect();
    nonzero.sort_by(|a, b| a.total_cmp(b));
    nonzero.dedup_by(|a, b| (*a - *b).abs() <= DISPLACEMENT_TOL);
    if nonzero.len() < 2 {
        return Err(DefectError::InsufficientDisplacements {
            found: nonzero.len(),
        });
    }

    let transformed: Vec<(f64, Array2<Complex64>)> = samples
        .iter()
        .map(|(q, m)| (*q, m.mapv(|w| phase.apply(w))))
        .collect();

    // 最小的对称位移对
    let symmetric = nonzero
        .iter()
        .filter(|&&q| q > 0.0)
        .filter_map(|&h| {
            let plus = transformed.iter().find(|(q, _)| (q - h).abs() <= DISPLACEMENT_TOL);
            let minus = transformed.iter().find(|(q, _)| (q + h).abs() <= DISPLACEMENT_TOL);
            match (plus, minus) {
                (Some(p), Some(m)) => Some((h, p, m)),
                _ => None,
            }
        })
        .next();

    if let Some((h, (_, m_plus), (_, m_minus))) = symmetric {
        let slope = (m_plus - m_minus).mapv(|w| w / (2.0 * h));
        return Ok((slope, DerivativeMethod::Central { step: h }));
    }

    let n = transformed.len() as f64;
    let q_mean = transformed.iter().map(|(q, _)| q).sum::<f64>() / n;
    let dim = transformed[0].1.dim();
    let mut m_mean = Array2::<Complex64>::zeros(dim);
    for (_, m) in &transformed {
        m_mean = m_mean + m;
    }
    m_mean.mapv_inplace(|w| w / n);

    let mut numer = Array2::<Complex64>::zeros(dim);
    let mut denom = 0.0;
    for (q, m) in &transformed {
        let dq = q - q_mean;
        numer = numer + (m - &m_mean).mapv(|w| w * dq);
        denom += dq * dq;
    }

    Ok((
        numer.mapv(|w| w / denom),
        DerivativeMethod::LeastSquares {
            points: transformed.len(),
        },
    ))
}

/// 计算缺陷态与同一 (k-point, spin) 上所有其它能带之间的电声耦合
pub fn electron_phonon_coupling(
    defect: &HarmonicDefect,
    state: BandIndex,
    phase: PhaseConvention,
) -> Result<ElphResult> {
    defect.require(Stage::OverlapAttached, "electron-phonon coupling")?;
    let overlaps = defect
        .overlaps()
        .ok_or_else(|| DefectError::MissingInput("overlap matrices".to_string()))?;
    let electronic = defect.relaxed_electronic()?;
    electronic.check_index(&state)?;

    let mut samples = Vec::new();
    for step in overlaps.steps() {
        let matrix = overlaps
            .matrix(step, state.kpoint, state.spin)
            .ok_or(DefectError::MissingOverlap {
                step,
                kpoint: state.kpoint,
                spin: state.spin.index(),
            })?;
        samples.push((defect.distortions()[step], matrix));
    }

    let nb = overlaps.nbands().unwrap_or(0);
    if state.band >= nb {
        return Err(DefectError::IndexOutOfRange(format!(
            "defect state {} outside {}x{} overlap matrices",
            state, nb, nb
        )));
    }

    let (slope, method) = overlap_slope(&samples, phase)?;
    log::debug!("Overlap derivative for {}: {}", state, method);

    let eps_i = electronic.eigenvalue(&state)?;
    let mut elements = BTreeMap::new();
    for f in (0..nb.min(electronic.nbands())).filter(|&f| f != state.band) {
        let eps_f = electronic.eigenvalue(&BandIndex::new(f, state.kpoint, state.spin))?;
        elements.insert(f, matrix_element(eps_i, eps_f, slope[[f, state.band]]));
    }

    Ok(ElphResult {
        defect_state: state,
        elements,
        method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defect::harmonic::tests::steps;
    use crate::models::{OverlapSet, Spin};

    /// 交叠矩阵 ⟨ψ_f(Q)|ψ_i(0)⟩ = δ_fi + Q·G_fi
    fn overlap_at(q: f64) -> Array2<Complex64> {
        let mut m = Array2::<Complex64>::eye(5);
        m[[3, 2]] += Complex64::new(0.4 * q, 0.0);
        m[[1, 2]] += Complex64::new(-0.2 * q, 0.0);
        m
    }

    #[test]
    fn test_central_difference() {
        let plus = overlap_at(0.1);
        let minus = overlap_at(-0.1);
        let zero = overlap_at(0.0);
        let samples = [(-0.1, &minus), (0.0, &zero), (0.1, &plus)];

        let (slope, method) = overlap_slope(&samples, PhaseConvention::Raw).unwrap();
        assert_eq!(method, DerivativeMethod::Central { step: 0.1 });
        assert!((slope[[3, 2]].re - 0.4).abs() < 1e-12);
        assert!(slope[[2, 2]].norm() < 1e-12);
    }

    #[test]
    fn test_least_squares_for_one_sided_displacements() {
        let a = overlap_at(0.0);
        let b = overlap_at(0.1);
        let c = overlap_at(0.2);
        let samples = [(0.0, &a), (0.1, &b), (0.2, &c)];

        let (slope, method) = overlap_slope(&samples, PhaseConvention::Raw).unwrap();
        assert_eq!(method, DerivativeMethod::LeastSquares { points: 3 });
        assert!((slope[[3, 2]].re - 0.4).abs() < 1e-12);
        assert!((slope[[1, 2]].re + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_displacements() {
        let a = overlap_at(0.0);
        let b = overlap_at(0.1);
        let samples = [(0.0, &a), (0.1, &b), (0.1, &b)];
        assert!(matches!(
            overlap_slope(&samples, PhaseConvention::Raw),
            Err(DefectError::InsufficientDisplacements { found: 1 })
        ));
    }

    #[test]
    fn test_magnitude_sign_removes_phase() {
        let w = Complex64::new(0.0, -0.5);
        assert_eq!(PhaseConvention::MagnitudeSign.apply(w), Complex64::new(0.5, 0.0));
        let w = Complex64::new(-0.3, 0.4);
        assert_eq!(PhaseConvention::MagnitudeSign.apply(w), Complex64::new(-0.5, 0.0));
    }

    #[test]
    fn test_matrix_element_antisymmetric_in_eigenvalues() {
        let slope = Complex64::new(0.3, -0.1);
        let forward = matrix_element(0.5, 1.5, slope);
        let swapped = matrix_element(1.5, 0.5, slope);
        assert!((forward + swapped).norm() < 1e-15);
        assert!((forward.norm() - swapped.norm()).abs() < 1e-15);
    }

    #[test]
    fn test_electron_phonon_coupling_from_defect() {
        let mut overlaps = OverlapSet::new();
        // steps(0.0) has Q = -0.2, -0.1, 0.0, 0.1, 0.2
        for (step, q) in [(1, -0.1), (2, 0.0), (3, 0.1)] {
            overlaps.insert(step, Spin::Up, 0, overlap_at(q)).unwrap();
        }
        let defect = HarmonicDefect::builder(steps(0.0))
            .build()
            .unwrap()
            .with_overlaps(overlaps)
            .unwrap();

        let state = BandIndex::new(2, 0, Spin::Up);
        let result = electron_phonon_coupling(&defect, state, PhaseConvention::Raw).unwrap();

        // eigenvalues: band 2 = 0.5, band 3 = 1.5, band 1 = -1.0
        assert_eq!(result.elements.len(), 4);
        assert!((result.elements[&3].re - (0.5 - 1.5) * 0.4).abs() < 1e-12);
        assert!((result.elements[&1].re - (0.5 + 1.0) * -0.2).abs() < 1e-12);
        assert!(result.elements[&0].norm() < 1e-12);
        assert!((result.mean_magnitude(&[3]).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_elph_requires_overlaps() {
        let defect = HarmonicDefect::builder(steps(0.0)).build().unwrap();
        let state = BandIndex::new(2, 0, Spin::Up);
        assert!(matches!(
            electron_phonon_coupling(&defect, state, PhaseConvention::Raw),
            Err(DefectError::StageRequired { .. })
        ));
    }

    #[test]
    fn test_missing_overlap_for_kpoint() {
        let mut overlaps = OverlapSet::new();
        overlaps.insert(1, Spin::Up, 0, overlap_at(-0.1)).unwrap();
        overlaps.insert(3, Spin::Up, 0, overlap_at(0.1)).unwrap();
        let defect = HarmonicDefect::builder(steps(0.0))
            .build()
            .unwrap()
            .with_overlaps(overlaps)
            .unwrap();
        let state = BandIndex::new(2, 0, Spin::Down);
        // spin down is outside the eigenvalue array
        assert!(electron_phonon_coupling(&defect, state, PhaseConvention::Raw).is_err());
    }
}
