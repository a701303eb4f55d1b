//! # 缺陷相关光学响应
//!
//! 独立粒子近似下的介电函数，按跃迁类别（价带→缺陷态、缺陷态→导带）分别求和。
//!
//! ## 算法概述
//! 1. 按缺陷能带构造跃迁掩码，掩码外的偶极矩阵元清零
//! 2. ε₂(E) = (4π²e²/Ω)·r_spin·Σ_k w_k Σ_{ε_j>ε_i} (f_i - f_j) Re(d_i d_j*) δ_σ(E - ε_j + ε_i)
//! 3. ε₁ 由带复数位移 η 的 Kramers-Kronig 变换得到
//!
//! 返回值只含跃迁贡献，不加真空项 1。
//!
//! 占据数 f 默认取电子结构自带的占据数（每个自旋轨道 0..1）；
//! 未提供或指定了费米能级时，使用展宽 σ 的费米-狄拉克分布。
//!
//! ## 依赖关系
//! - 被 `commands/optics.rs` 调用
//! - 使用 `models/dipole.rs`, `models/electronic.rs`, `defect/harmonic.rs`

use crate::defect::constants::COULOMB_EV_ANGSTROM;
use crate::defect::harmonic::{HarmonicDefect, Stage};
use crate::error::{DefectError, Result};
use crate::models::{DefectBand, Direction, DipoleSet, ElectronicData};

use ndarray::{Array1, Array3, Array4};
use num_complex::Complex64;
use std::f64::consts::PI;

/// 高斯展宽截断（σ 的倍数）
const GAUSSIAN_CUTOFF: f64 = 6.0;

/// 跃迁类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionClass {
    ValenceToDefect,
    DefectToConduction,
}

impl TransitionClass {
    pub fn label(self) -> &'static str {
        match self {
            TransitionClass::ValenceToDefect => "valence->defect",
            TransitionClass::DefectToConduction => "defect->conduction",
        }
    }
}

/// 计算占据数使用的费米能级
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FermiLevel {
    /// 电子结构自带的占据数；没有占据数时用自带的费米能级
    #[default]
    Natural,
    /// 指定值 (eV)
    Explicit(f64),
    /// 缺陷态与上方能带的中点，缺陷态被占据
    DefectOccupied,
    /// 下方能带与缺陷态的中点，缺陷态为空
    DefectEmpty,
}

/// 跃迁权重中的占据数来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Occupations {
    /// 电子结构自带的占据数
    Computed,
    /// 给定费米能级 (eV) 的费米-狄拉克分布
    FermiDirac(f64),
}

impl Occupations {
    /// 费米-狄拉克分布使用的费米能级
    pub fn efermi(self) -> Option<f64> {
        match self {
            Occupations::Computed => None,
            Occupations::FermiDirac(ef) => Some(ef),
        }
    }
}

/// 光学响应参数
#[derive(Debug, Clone)]
pub struct OpticsOptions {
    /// 能量网格点数
    pub nedos: usize,
    /// 能量网格间距 (eV)
    pub deltae: f64,
    /// 费米-狄拉克和高斯展宽 (eV)
    pub sigma: f64,
    /// Kramers-Kronig 复数位移 (eV)
    pub cshift: f64,
    pub fermi: FermiLevel,
    /// 超胞体积 (Å³)；未指定时取弛豫结构体积
    pub volume: Option<f64>,
}

impl Default for OpticsOptions {
    fn default() -> Self {
        OpticsOptions {
            nedos: 2000,
            deltae: 0.005,
            sigma: 0.1,
            cshift: 0.1,
            fermi: FermiLevel::Natural,
            volume: None,
        }
    }
}

impl OpticsOptions {
    fn validate(&self) -> Result<()> {
        if self.nedos == 0 {
            return Err(DefectError::InvalidArgument("nedos must be positive".to_string()));
        }
        if !(self.deltae > 0.0) {
            return Err(DefectError::InvalidArgument(format!(
                "energy spacing must be positive (got {})",
                self.deltae
            )));
        }
        if !(self.sigma > 0.0) {
            return Err(DefectError::InvalidArgument(format!(
                "smearing must be positive (got {})",
                self.sigma
            )));
        }
        if self.cshift < 0.0 {
            return Err(DefectError::InvalidArgument(format!(
                "complex shift must be non-negative (got {})",
                self.cshift
            )));
        }
        Ok(())
    }

    /// 能量网格 0, deltae, 2·deltae, ...
    pub fn energies(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.nedos, |n| n as f64 * self.deltae)
    }
}

/// 费米-狄拉克占据数
fn fermi_dirac(energy: f64, efermi: f64, sigma: f64) -> f64 {
    let x = (energy - efermi) / sigma;
    if x > 0.0 {
        let e = (-x).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + x.exp())
    }
}

/// 介电函数计算器
pub struct DielectricFunctionCalculator<'a> {
    dipoles: &'a DipoleSet,
    electronic: &'a ElectronicData,
    volume: f64,
}

impl<'a> DielectricFunctionCalculator<'a> {
    pub fn new(dipoles: &'a DipoleSet, electronic: &'a ElectronicData, volume: f64) -> Result<Self> {
        if !(volume > 0.0) {
            return Err(DefectError::InvalidArgument(format!(
                "cell volume must be positive (got {} A^3)",
                volume
            )));
        }
        let (nb, nk, ns) = dipoles.shape();
        if nb > electronic.nbands() || nk != electronic.nkpoints() || ns != electronic.nspins() {
            return Err(DefectError::InvalidData(format!(
                "dipole shape ({}, {}, {}) incompatible with eigenvalues ({}, {}, {})",
                nb,
                nk,
                ns,
                electronic.nbands(),
                electronic.nkpoints(),
                electronic.nspins()
            )));
        }
        Ok(DielectricFunctionCalculator {
            dipoles,
            electronic,
            volume,
        })
    }

    /// 介电函数虚部
    pub fn epsilon_imag(
        &self,
        idir: Direction,
        jdir: Direction,
        occupations: Occupations,
        mask: Option<&Array4<bool>>,
        opts: &OpticsOptions,
    ) -> Result<Array1<f64>> {
        opts.validate()?;

        let masked;
        let dipoles = match mask {
            Some(mask) => {
                masked = self.dipoles.masked(mask)?;
                &masked
            }
            None => self.dipoles,
        };

        let (nb, nk, ns) = dipoles.shape();
        let spin_factor = if self.electronic.is_spin_polarized() { 1.0 } else { 2.0 };
        let prefactor = 4.0 * PI * PI * COULOMB_EV_ANGSTROM / self.volume * spin_factor;

        let wsum: f64 = self.electronic.kweights.sum();
        if !(wsum > 0.0) {
            return Err(DefectError::InvalidData("k-point weights sum to zero".to_string()));
        }

        let sigma = opts.sigma;
        let occ = self.occupations(occupations, sigma)?;
        let gauss_norm = 1.0 / (sigma * (2.0 * PI).sqrt());
        let mut imag = Array1::<f64>::zeros(opts.nedos);

        for s in 0..ns {
            for k in 0..nk {
                let wk = self.electronic.kweights[k] / wsum;
                for i in 0..nb {
                    let eps_i = self.electronic.eigenvalues[[s, k, i]];
                    let f_i = occ[[s, k, i]];
                    for j in 0..nb {
                        let eps_j = self.electronic.eigenvalues[[s, k, j]];
                        let de = eps_j - eps_i;
                        if de <= 0.0 {
                            continue;
                        }
                        let d_a = dipoles.get(i, j, k, s, idir);
                        let d_b = dipoles.get(i, j, k, s, jdir);
                        let strength = (d_a * d_b.conj()).re;
                        let df = f_i - occ[[s, k, j]];
                        let weight = prefactor * wk * df * strength;
                        if weight == 0.0 {
                            continue;
                        }

                        let lo = ((de - GAUSSIAN_CUTOFF * sigma) / opts.deltae).floor().max(0.0) as usize;
                        let hi = (((de + GAUSSIAN_CUTOFF * sigma) / opts.deltae).ceil() as usize + 1)
                            .min(opts.nedos);
                        for n in lo..hi {
                            let x = (n as f64 * opts.deltae - de) / sigma;
                            imag[n] += weight * gauss_norm * (-0.5 * x * x).exp();
                        }
                    }
                }
            }
        }

        Ok(imag)
    }

    /// 复介电函数（Kramers-Kronig 实部 + i·虚部）
    pub fn epsilon(
        &self,
        idir: Direction,
        jdir: Direction,
        occupations: Occupations,
        mask: Option<&Array4<bool>>,
        opts: &OpticsOptions,
    ) -> Result<Array1<Complex64>> {
        let imag = self.epsilon_imag(idir, jdir, occupations, mask, opts)?;
        let real = kramers_kronig(&imag, opts.deltae, opts.cshift);
        Ok(real
            .iter()
            .zip(imag.iter())
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect())
    }

    /// 占据数数组，形状 (nspin, nkpt, nband)
    fn occupations(&self, occupations: Occupations, sigma: f64) -> Result<Array3<f64>> {
        match occupations {
            Occupations::Computed => self.electronic.occupations.clone().ok_or_else(|| {
                DefectError::MissingInput("occupations of the relaxed step".to_string())
            }),
            Occupations::FermiDirac(efermi) => Ok(self
                .electronic
                .eigenvalues
                .mapv(|e| fermi_dirac(e, efermi, sigma))),
        }
    }
}

/// ε₁(E) = (2/π) Σ_E' ε₂(E') E' ΔE · Re[1 / (E'² - (E + iη)²)]
fn kramers_kronig(imag: &Array1<f64>, deltae: f64, cshift: f64) -> Array1<f64> {
    let n = imag.len();
    Array1::from_shape_fn(n, |a| {
        let z = Complex64::new(a as f64 * deltae, cshift);
        let z2 = z * z;
        let sum: f64 = imag
            .iter()
            .enumerate()
            .filter(|(_, im)| **im != 0.0)
            .map(|(b, im)| {
                let e = b as f64 * deltae;
                im * e * (Complex64::new(e * e, 0.0) - z2).inv().re
            })
            .sum();
        2.0 / PI * deltae * sum
    })
}

/// 跃迁掩码 (价带→缺陷态, 缺陷态→导带)，形状 (nbands, nbands, nkpoints, nspins)
pub fn transition_masks(
    defect_band: &DefectBand,
    shape: (usize, usize, usize),
) -> Result<(Array4<bool>, Array4<bool>)> {
    let (nb, nk, ns) = shape;
    let mut valence = Array4::from_elem((nb, nb, nk, ns), false);
    let mut conduction = Array4::from_elem((nb, nb, nk, ns), false);

    for entry in defect_band.entries() {
        let s = entry.spin.index();
        if entry.band >= nb || entry.kpoint >= nk || s >= ns {
            return Err(DefectError::IndexOutOfRange(format!(
                "defect state {} outside dipole shape ({}, {}, {})",
                entry, nb, nk, ns
            )));
        }
        let d = entry.band;
        for i in 0..d {
            valence[[i, d, entry.kpoint, s]] = true;
        }
        for j in (d + 1)..nb {
            conduction[[d, j, entry.kpoint, s]] = true;
        }
    }

    Ok((valence, conduction))
}

/// 按设定解析占据数来源
pub fn resolve_occupations(
    electronic: &ElectronicData,
    defect_band: &DefectBand,
    fermi: FermiLevel,
) -> Result<Occupations> {
    match fermi {
        FermiLevel::Natural if electronic.occupations.is_some() => Ok(Occupations::Computed),
        _ => resolve_fermi_level(electronic, defect_band, fermi).map(Occupations::FermiDirac),
    }
}

/// 按设定解析费米能级
pub fn resolve_fermi_level(
    electronic: &ElectronicData,
    defect_band: &DefectBand,
    fermi: FermiLevel,
) -> Result<f64> {
    let state = || {
        defect_band
            .representative()
            .ok_or_else(|| DefectError::MissingInput("defect band".to_string()))
    };

    match fermi {
        FermiLevel::Natural => Ok(electronic.efermi),
        FermiLevel::Explicit(value) => Ok(value),
        FermiLevel::DefectOccupied => {
            let d = state()?;
            let eps = electronic.eigenvalue(d)?;
            if d.band + 1 >= electronic.nbands() {
                return Err(DefectError::InvalidArgument(format!(
                    "no band above defect state {} to place the Fermi level",
                    d
                )));
            }
            let above = electronic.eigenvalues[[d.spin.index(), d.kpoint, d.band + 1]];
            Ok(0.5 * (eps + above))
        }
        FermiLevel::DefectEmpty => {
            let d = state()?;
            let eps = electronic.eigenvalue(d)?;
            if d.band == 0 {
                return Err(DefectError::InvalidArgument(format!(
                    "no band below defect state {} to place the Fermi level",
                    d
                )));
            }
            let below = electronic.eigenvalues[[d.spin.index(), d.kpoint, d.band - 1]];
            Ok(0.5 * (below + eps))
        }
    }
}

/// 缺陷相关介电函数谱
#[derive(Debug, Clone)]
pub struct DielectricSpectrum {
    pub energies: Array1<f64>,
    pub valence_to_defect: Array1<Complex64>,
    pub defect_to_conduction: Array1<Complex64>,
    /// 实际使用的占据数来源
    pub occupations: Occupations,
}

impl DielectricSpectrum {
    pub fn component(&self, class: TransitionClass) -> &Array1<Complex64> {
        match class {
            TransitionClass::ValenceToDefect => &self.valence_to_defect,
            TransitionClass::DefectToConduction => &self.defect_to_conduction,
        }
    }
}

/// 计算缺陷的两类跃迁介电函数
pub fn defect_dielectric_function(
    defect: &HarmonicDefect,
    idir: Direction,
    jdir: Direction,
    opts: &OpticsOptions,
) -> Result<DielectricSpectrum> {
    defect.require(Stage::PesFitted, "dielectric function")?;
    let dipoles = defect
        .dipoles()
        .ok_or_else(|| DefectError::MissingInput("dipole matrix elements".to_string()))?;
    let electronic = defect.relaxed_electronic()?;

    let volume = match opts.volume {
        Some(v) => v,
        None => defect
            .relaxed_structure()
            .map(|s| s.volume())
            .ok_or_else(|| {
                DefectError::MissingInput("cell volume (no structure on relaxed step)".to_string())
            })?,
    };

    let occupations = resolve_occupations(electronic, defect.defect_band(), opts.fermi)?;
    match occupations.efermi() {
        Some(ef) => log::info!(
            "Dielectric function {}{} with Fermi-Dirac occupations at E_F = {:.4} eV, volume = {:.3} A^3",
            idir,
            jdir,
            ef,
            volume
        ),
        None => log::info!(
            "Dielectric function {}{} with computed occupations, volume = {:.3} A^3",
            idir,
            jdir,
            volume
        ),
    }

    let calculator = DielectricFunctionCalculator::new(dipoles, electronic, volume)?;
    let (valence, conduction) = transition_masks(defect.defect_band(), dipoles.shape())?;

    Ok(DielectricSpectrum {
        energies: opts.energies(),
        valence_to_defect: calculator.epsilon(idir, jdir, occupations, Some(&valence), opts)?,
        defect_to_conduction: calculator.epsilon(idir, jdir, occupations, Some(&conduction), opts)?,
        occupations,
    })
}
