//! # 物理常数
//!
//! CODATA 2018 取值。位形坐标使用 eV、amu^1/2 Å 单位制，
//! 此时 E = ½ω²Q² 中的 ω 单位为 eV^1/2 amu^-1/2 Å^-1。
//!
//! ## 依赖关系
//! - 被 `defect/` 各计算模块使用

/// 约化普朗克常数 (eV·s)
pub const HBAR_EV_S: f64 = 6.582_119_569e-16;

/// 玻尔兹曼常数 (eV/K)
pub const BOLTZMANN_EV_K: f64 = 8.617_333_262e-5;

/// 位形坐标单位制下的 ħ：ħω (eV) = HBAR_CC · ω
pub const HBAR_CC: f64 = 0.064_654_151_335_955_66;

/// e²/(4πε₀) (eV·Å)
pub const COULOMB_EV_ANGSTROM: f64 = 14.399_645;

/// Å³ → cm³
pub const ANGSTROM3_TO_CM3: f64 = 1e-24;
