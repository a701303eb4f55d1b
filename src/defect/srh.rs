//! # SRH 非辐射俘获系数
//!
//! 一维位形坐标模型下的多声子俘获：
//!
//! ```text
//! C(T) = (2π/ħ)·g·Ω·|W̄|²·Σ_m w_m(T) Σ_n |⟨χ_m^i|Q|χ_n^f⟩|² δ_σ(ΔE + mħω_i - nħω_f)
//! ```
//!
//! ## 算法概述
//! 1. 从初态（或末态）的交叠矩阵计算缺陷态与带边态之间的电声耦合平均值 W̄
//! 2. 两个谐振子的 ħω 来自各自的势能面拟合，ΔQ 来自势能面最低点或弛豫结构
//! 3. 能级数由最高温度下的玻尔兹曼占据决定，振动矩阵元只计算一次
//! 4. 每个温度只需对预先求和的 S_m 做玻尔兹曼加权
//!
//! ## 依赖关系
//! - 被 `commands/srh.rs` 和 `batch/runner.rs` 调用
//! - 使用 `defect/elph.rs`, `defect/vibronic.rs`, `defect/harmonic.rs`

use crate::defect::constants::{ANGSTROM3_TO_CM3, BOLTZMANN_EV_K, HBAR_EV_S};
use crate::defect::elph::{electron_phonon_coupling, PhaseConvention};
use crate::defect::harmonic::{HarmonicDefect, Stage};
use crate::defect::vibronic::{position_matrix, Oscillator};
use crate::error::{DefectError, Result};
use crate::models::BandIndex;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 初态振动能级数下限
const MIN_INITIAL_LEVELS: usize = 17;
/// 末态振动能级数下限
const MIN_FINAL_LEVELS: usize = 50;
/// 初态振动能级数上限
const MAX_INITIAL_LEVELS: usize = 150;
/// 末态振动能级数上限
const MAX_FINAL_LEVELS: usize = 250;
/// 默认高斯展宽与 ħω_f 之比
const DEFAULT_SIGMA_RATIO: f64 = 0.8;

/// 俘获所涉及的带边
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandEdge {
    /// 缺陷能带上方的能带（电子俘获）
    #[default]
    Conduction,
    /// 缺陷能带下方的能带（空穴俘获）
    Valence,
}

impl std::fmt::Display for BandEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandEdge::Conduction => write!(f, "conduction"),
            BandEdge::Valence => write!(f, "valence"),
        }
    }
}

/// ΔQ 的来源
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DqSource {
    /// 两个势能面最低点之差（需要共享的显式坐标）
    #[default]
    PesMinima,
    /// 两个弛豫结构之间的质量加权距离
    Structures,
    /// 指定值 (amu^1/2 Å)
    Explicit(f64),
}

/// SRH 计算参数
#[derive(Debug, Clone)]
pub struct SrhOptions {
    /// 简并因子 g
    pub degeneracy: f64,
    /// 最高温度下最高初态能级的占据阈值
    pub occ_tol: f64,
    /// 高斯展宽 (eV)；None 时取 0.8·ħω_f
    pub sigma: Option<f64>,
    pub band_edge: BandEdge,
    /// 参与平均的带边能带数
    pub n_band_edge: usize,
    /// 使用末态的交叠矩阵计算电声耦合
    pub use_final_state_elph: bool,
    pub dq: DqSource,
    /// 超胞体积 (Å³)；None 时取初态弛豫结构体积
    pub volume: Option<f64>,
    pub phase: PhaseConvention,
}

impl Default for SrhOptions {
    fn default() -> Self {
        SrhOptions {
            degeneracy: 1.0,
            occ_tol: 1e-5,
            sigma: None,
            band_edge: BandEdge::default(),
            n_band_edge: 1,
            use_final_state_elph: false,
            dq: DqSource::default(),
            volume: None,
            phase: PhaseConvention::default(),
        }
    }
}

/// 俘获系数计算的标量输入
#[derive(Debug, Clone, Copy)]
pub struct CaptureInputs {
    /// ΔQ (amu^1/2 Å)
    pub dq: f64,
    /// ΔE，零声子线能量 (eV)
    pub energy_offset: f64,
    /// 初态 ħω (eV)
    pub hbar_omega_i: f64,
    /// 末态 ħω (eV)
    pub hbar_omega_f: f64,
    /// 电声耦合 W̄ (eV amu^-1/2 Å^-1)
    pub elph: f64,
    /// 超胞体积 (Å³)
    pub volume: f64,
}

/// 俘获系数计算结果
#[derive(Debug, Clone)]
pub struct SrhResult {
    pub temperatures: Vec<f64>,
    /// 俘获系数 (cm³/s)，与温度一一对应
    pub coefficients: Vec<f64>,
    pub inputs: CaptureInputs,
    /// 实际使用的高斯展宽 (eV)
    pub sigma: f64,
    /// (初态能级数, 末态能级数)
    pub levels: (usize, usize),
}

/// 振动能级数 (Ni, Nf)
pub fn level_counts(
    kt_max: f64,
    energy_offset: f64,
    hbar_omega_i: f64,
    hbar_omega_f: f64,
    occ_tol: f64,
) -> (usize, usize) {
    let thermal = (-kt_max * occ_tol.ln() / hbar_omega_i).ceil().max(0.0) as usize;
    let mut ni = thermal.max(MIN_INITIAL_LEVELS);
    if ni > MAX_INITIAL_LEVELS {
        log::warn!(
            "Initial vibrational levels capped at {} (requested {})",
            MAX_INITIAL_LEVELS,
            ni
        );
        ni = MAX_INITIAL_LEVELS;
    }

    let reach = ((energy_offset + ni as f64 * hbar_omega_i) / hbar_omega_f)
        .ceil()
        .max(0.0) as usize;
    let mut nf = reach.max(MIN_FINAL_LEVELS);
    if nf > MAX_FINAL_LEVELS {
        log::warn!(
            "Final vibrational levels capped at {} (requested {})",
            MAX_FINAL_LEVELS,
            nf
        );
        nf = MAX_FINAL_LEVELS;
    }

    (ni, nf)
}

/// 初态第 m 能级在温度 T 下的玻尔兹曼占据
fn boltzmann_weights(ni: usize, hbar_omega: f64, temperature: f64) -> Vec<f64> {
    if temperature == 0.0 {
        let mut w = vec![0.0; ni];
        if let Some(first) = w.first_mut() {
            *first = 1.0;
        }
        return w;
    }
    let x = hbar_omega / (BOLTZMANN_EV_K * temperature);
    let norm = -(-x).exp_m1();
    (0..ni).map(|m| (-(m as f64) * x).exp() * norm).collect()
}

/// 由标量输入计算各温度下的俘获系数 (cm³/s)
pub fn capture_coefficients(
    inputs: &CaptureInputs,
    temperatures: &[f64],
    opts: &SrhOptions,
) -> Result<SrhResult> {
    if let Some(t) = temperatures.iter().find(|t| !(**t >= 0.0) || !t.is_finite()) {
        return Err(DefectError::InvalidArgument(format!(
            "temperatures must be finite and non-negative (got {})",
            t
        )));
    }
    if !(inputs.energy_offset >= 0.0) {
        return Err(DefectError::InvalidArgument(format!(
            "energy offset must be non-negative (got {} eV)",
            inputs.energy_offset
        )));
    }
    if !(inputs.volume > 0.0) {
        return Err(DefectError::InvalidArgument(format!(
            "cell volume must be positive (got {} A^3)",
            inputs.volume
        )));
    }
    if !(opts.occ_tol > 0.0 && opts.occ_tol < 1.0) {
        return Err(DefectError::InvalidArgument(format!(
            "occupation tolerance must lie in (0, 1) (got {})",
            opts.occ_tol
        )));
    }
    if !inputs.dq.is_finite() || !inputs.elph.is_finite() {
        return Err(DefectError::InvalidArgument(format!(
            "non-finite capture input (dQ = {}, W = {})",
            inputs.dq, inputs.elph
        )));
    }

    let sigma = opts
        .sigma
        .unwrap_or(DEFAULT_SIGMA_RATIO * inputs.hbar_omega_f);
    if !(sigma > 0.0) {
        return Err(DefectError::InvalidArgument(format!(
            "smearing must be positive (got {} eV)",
            sigma
        )));
    }

    let t_max = temperatures.iter().cloned().fold(0.0, f64::max);
    let (ni, nf) = level_counts(
        BOLTZMANN_EV_K * t_max,
        inputs.energy_offset,
        inputs.hbar_omega_i,
        inputs.hbar_omega_f,
        opts.occ_tol,
    );
    log::debug!(
        "SRH levels: Ni = {}, Nf = {}, sigma = {:.4} eV, dQ = {:.4}",
        ni,
        nf,
        sigma,
        inputs.dq
    );

    let initial = Oscillator::new(inputs.hbar_omega_i, 0.0);
    let final_ = Oscillator::new(inputs.hbar_omega_f, inputs.dq.abs());
    let overlaps = position_matrix(&initial, &final_, ni, nf)?;

    // S_m = Σ_n |A_mn|² δ_σ(ΔE + mħω_i - nħω_f)
    let gauss_norm = 1.0 / (sigma * (2.0 * PI).sqrt());
    let partial: Vec<f64> = (0..ni)
        .map(|m| {
            (0..nf)
                .map(|n| {
                    let x = inputs.energy_offset + m as f64 * inputs.hbar_omega_i
                        - n as f64 * inputs.hbar_omega_f;
                    overlaps[[m, n]].powi(2) * gauss_norm * (-0.5 * (x / sigma).powi(2)).exp()
                })
                .sum()
        })
        .collect();

    let prefactor = 2.0 * PI / HBAR_EV_S
        * opts.degeneracy
        * inputs.volume
        * ANGSTROM3_TO_CM3
        * inputs.elph
        * inputs.elph;

    let coefficients = temperatures
        .iter()
        .map(|&t| {
            let weights = boltzmann_weights(ni, inputs.hbar_omega_i, t);
            prefactor
                * weights
                    .iter()
                    .zip(partial.iter())
                    .map(|(w, s)| w * s)
                    .sum::<f64>()
        })
        .collect();

    Ok(SrhResult {
        temperatures: temperatures.to_vec(),
        coefficients,
        inputs: *inputs,
        sigma,
        levels: (ni, nf),
    })
}

/// 两个电荷态之间的俘获
pub struct SrhCapture<'a> {
    initial: &'a HarmonicDefect,
    final_: &'a HarmonicDefect,
}

impl<'a> SrhCapture<'a> {
    pub fn new(initial: &'a HarmonicDefect, final_: &'a HarmonicDefect) -> Result<Self> {
        initial.require(Stage::PesFitted, "SRH capture (initial state)")?;
        final_.require(Stage::PesFitted, "SRH capture (final state)")?;

        let nk_i = initial.defect_band().nkpoints();
        let nk_f = final_.defect_band().nkpoints();
        if nk_i != nk_f {
            return Err(DefectError::DefectBandMismatch {
                initial: nk_i,
                final_: nk_f,
            });
        }
        Ok(SrhCapture { initial, final_ })
    }

    /// 两个平衡位置之间的位移 ΔQ (amu^1/2 Å)
    pub fn dq(&self, source: DqSource) -> Result<f64> {
        match source {
            DqSource::Explicit(value) => Ok(value.abs()),
            DqSource::PesMinima => {
                match (self.initial.shared_minimum(), self.final_.shared_minimum()) {
                    (Some(qi), Some(qf)) => Ok((qf - qi).abs()),
                    _ => {
                        log::warn!(
                            "No shared distortion coordinate for '{}' and '{}'; using relaxed structures for dQ",
                            self.initial.name(),
                            self.final_.name()
                        );
                        self.dq(DqSource::Structures)
                    }
                }
            }
            DqSource::Structures => {
                let si = self.initial.relaxed_structure();
                let sf = self.final_.relaxed_structure();
                match (si, sf) {
                    (Some(si), Some(sf)) => si.mass_weighted_distance(sf),
                    _ => Err(DefectError::MissingInput(
                        "relaxed structures of both charge states for dQ".to_string(),
                    )),
                }
            }
        }
    }

    /// 缺陷态与带边态之间电声耦合的平均值 W̄
    pub fn elph_average(&self, state: BandIndex, opts: &SrhOptions) -> Result<f64> {
        if opts.n_band_edge == 0 {
            return Err(DefectError::InvalidArgument(
                "at least one band-edge state is required".to_string(),
            ));
        }
        let source = if opts.use_final_state_elph {
            self.final_
        } else {
            self.initial
        };
        let result = electron_phonon_coupling(source, state, opts.phase)?;

        let bands: Vec<usize> = match opts.band_edge {
            BandEdge::Conduction => (state.band + 1..=state.band + opts.n_band_edge).collect(),
            BandEdge::Valence => {
                if state.band < opts.n_band_edge {
                    return Err(DefectError::IndexOutOfRange(format!(
                        "{} valence band-edge states below defect state {}",
                        opts.n_band_edge, state
                    )));
                }
                (state.band - opts.n_band_edge..state.band).collect()
            }
        };
        let average = result.mean_magnitude(&bands)?;
        log::info!(
            "Electron-phonon coupling for {} ({} edge, bands {:?}): {:.6e}",
            state,
            opts.band_edge,
            bands,
            average
        );
        Ok(average)
    }

    fn volume(&self, opts: &SrhOptions) -> Result<f64> {
        match opts.volume {
            Some(v) => Ok(v),
            None => self
                .initial
                .relaxed_structure()
                .map(|s| s.volume())
                .ok_or_else(|| {
                    DefectError::MissingInput(
                        "cell volume (no structure on the initial relaxed step)".to_string(),
                    )
                }),
        }
    }

    /// 俘获系数，与输入温度一一对应
    pub fn capture_coefficients(
        &self,
        state: BandIndex,
        temperatures: &[f64],
        energy_offset: f64,
        opts: &SrhOptions,
    ) -> Result<SrhResult> {
        let inputs = CaptureInputs {
            dq: self.dq(opts.dq)?,
            energy_offset,
            hbar_omega_i: self.initial.hbar_omega(),
            hbar_omega_f: self.final_.hbar_omega(),
            elph: self.elph_average(state, opts)?,
            volume: self.volume(opts)?,
        };
        capture_coefficients(&inputs, temperatures, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defect::harmonic::tests::steps;
    use crate::defect::locator::DefectBandSource;
    use crate::models::{DefectBand, OverlapSet, Spin};
    use ndarray::Array2;
    use num_complex::Complex64;

    fn overlap_at(q: f64) -> Array2<Complex64> {
        let mut m = Array2::<Complex64>::eye(5);
        m[[3, 2]] += Complex64::new(0.4 * q, 0.0);
        m[[1, 2]] += Complex64::new(-0.2 * q, 0.0);
        m
    }

    fn initial_defect() -> HarmonicDefect {
        let mut overlaps = OverlapSet::new();
        for (step, q) in [(1, -0.1), (2, 0.0), (3, 0.1)] {
            overlaps.insert(step, Spin::Up, 0, overlap_at(q)).unwrap();
        }
        HarmonicDefect::builder(steps(0.0))
            .build()
            .unwrap()
            .with_overlaps(overlaps)
            .unwrap()
    }

    fn final_defect() -> HarmonicDefect {
        HarmonicDefect::builder(steps(0.3)).build().unwrap()
    }

    fn inputs() -> CaptureInputs {
        CaptureInputs {
            dq: 1.5,
            energy_offset: 0.8,
            hbar_omega_i: 0.03,
            hbar_omega_f: 0.03,
            elph: 0.05,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_level_counts_minimums() {
        let (ni, nf) = level_counts(0.0, 1.0, 0.3, 0.3, 1e-5);
        assert_eq!(ni, 17);
        assert_eq!(nf, 50);
    }

    #[test]
    fn test_level_counts_capped() {
        let (ni, nf) = level_counts(0.1, 5.0, 0.001, 0.001, 1e-5);
        assert_eq!(ni, 150);
        assert_eq!(nf, 250);
    }

    #[test]
    fn test_boltzmann_weights_normalized() {
        let w = boltzmann_weights(400, 0.03, 300.0);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        assert_eq!(boltzmann_weights(3, 0.03, 0.0), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_capture_coefficients_finite_non_negative() {
        let temps = [0.0, 100.0, 300.0, 500.0];
        let result = capture_coefficients(&inputs(), &temps, &SrhOptions::default()).unwrap();

        assert_eq!(result.coefficients.len(), temps.len());
        assert_eq!(result.temperatures, temps.to_vec());
        for c in &result.coefficients {
            assert!(c.is_finite());
            assert!(*c >= 0.0);
        }
        assert!(result.coefficients.iter().any(|c| *c > 0.0));
        assert!((result.sigma - 0.024).abs() < 1e-12);
    }

    #[test]
    fn test_capture_scales_with_elph_squared() {
        let temps = [300.0];
        let base = capture_coefficients(&inputs(), &temps, &SrhOptions::default()).unwrap();
        let doubled = CaptureInputs {
            elph: 0.1,
            ..inputs()
        };
        let scaled = capture_coefficients(&doubled, &temps, &SrhOptions::default()).unwrap();
        assert!((scaled.coefficients[0] - 4.0 * base.coefficients[0]).abs() < 1e-12 * scaled.coefficients[0]);
    }

    #[test]
    fn test_negative_temperature_rejected() {
        assert!(matches!(
            capture_coefficients(&inputs(), &[300.0, -1.0], &SrhOptions::default()),
            Err(DefectError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_negative_energy_offset_rejected() {
        let bad = CaptureInputs {
            energy_offset: -0.1,
            ..inputs()
        };
        assert!(capture_coefficients(&bad, &[300.0], &SrhOptions::default()).is_err());
    }

    #[test]
    fn test_dq_from_pes_minima() {
        let initial = initial_defect();
        let final_ = final_defect();
        let capture = SrhCapture::new(&initial, &final_).unwrap();
        assert!((capture.dq(DqSource::PesMinima).unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(capture.dq(DqSource::Explicit(-0.7)).unwrap(), 0.7);
        // no structures on these steps
        assert!(capture.dq(DqSource::Structures).is_err());
    }

    #[test]
    fn test_capture_between_charge_states() {
        let initial = initial_defect();
        let final_ = final_defect();
        let capture = SrhCapture::new(&initial, &final_).unwrap();

        let opts = SrhOptions {
            volume: Some(1000.0),
            ..SrhOptions::default()
        };
        let state = BandIndex::new(2, 0, Spin::Up);
        assert!((capture.elph_average(state, &opts).unwrap() - 0.4).abs() < 1e-12);

        let temps = [10.0, 300.0];
        let result = capture
            .capture_coefficients(state, &temps, 0.5, &opts)
            .unwrap();
        assert_eq!(result.coefficients.len(), 2);
        assert!(result.coefficients.iter().all(|c| c.is_finite() && *c >= 0.0));
        assert!((result.inputs.dq - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_valence_edge_average() {
        let initial = initial_defect();
        let final_ = final_defect();
        let capture = SrhCapture::new(&initial, &final_).unwrap();
        let opts = SrhOptions {
            band_edge: BandEdge::Valence,
            ..SrhOptions::default()
        };
        let state = BandIndex::new(2, 0, Spin::Up);
        // W_21 = (0.5 - (-1.0)) * (-0.2)
        assert!((capture.elph_average(state, &opts).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_final_state_elph_requires_overlaps() {
        let initial = initial_defect();
        let final_ = final_defect();
        let capture = SrhCapture::new(&initial, &final_).unwrap();
        let opts = SrhOptions {
            use_final_state_elph: true,
            ..SrhOptions::default()
        };
        let state = BandIndex::new(2, 0, Spin::Up);
        assert!(matches!(
            capture.elph_average(state, &opts),
            Err(DefectError::StageRequired { .. })
        ));
    }

    #[test]
    fn test_defect_band_mismatch() {
        let initial = initial_defect();
        let bare: Vec<_> = steps(0.0)
            .into_iter()
            .map(|mut s| {
                s.electronic = None;
                s
            })
            .collect();
        let two_k = DefectBand::new(vec![
            BandIndex::new(2, 0, Spin::Up),
            BandIndex::new(2, 1, Spin::Up),
        ])
        .unwrap();
        let final_ = HarmonicDefect::builder(bare)
            .defect_band(DefectBandSource::Explicit(two_k))
            .build()
            .unwrap();

        assert!(matches!(
            SrhCapture::new(&initial, &final_),
            Err(DefectError::DefectBandMismatch {
                initial: 1,
                final_: 2
            })
        ));
    }
}
