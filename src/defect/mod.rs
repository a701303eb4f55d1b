//! # 缺陷物理计算核心
//!
//! 单线程、同步的数值核心，不做任何文件 I/O。
//!
//! ## 子模块
//! - `locator` - 缺陷能带定位
//! - `coordinate` - 位形坐标
//! - `pes` - 谐振势能面拟合
//! - `harmonic` - 谐振缺陷及其阶段状态机
//! - `elph` - 电声耦合矩阵元
//! - `optics` - 缺陷相关介电函数
//! - `vibronic` - 谐振子振动矩阵元
//! - `srh` - SRH 非辐射俘获系数
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `batch/` 使用
//! - 使用 `models/`

pub mod constants;
pub mod coordinate;
pub mod elph;
pub mod harmonic;
pub mod locator;
pub mod optics;
pub mod pes;
pub mod srh;
pub mod vibronic;

pub use elph::{electron_phonon_coupling, PhaseConvention};
pub use harmonic::{HarmonicDefect, HarmonicDefectBuilder};
pub use locator::{participation_number, DefectBandSource, LocatorOptions, TieBreak};
pub use optics::{defect_dielectric_function, FermiLevel, OpticsOptions, TransitionClass};
pub use srh::{BandEdge, DqSource, SrhCapture, SrhOptions, SrhResult};
