//! # 数据模型模块
//!
//! 定义缺陷分析使用的统一数据模型：能带索引、电子结构、晶体结构、
//! 畸变步计算结果、波函数交叠矩阵和偶极矩阵元。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`defect/` 和 `commands/` 使用
//! - 子模块: band, calculation, dipole, electronic, elements, overlap, structure

pub mod band;
pub mod calculation;
pub mod dipole;
pub mod electronic;
pub mod elements;
pub mod overlap;
pub mod structure;

pub use band::{BandIndex, DefectBand, Spin};
pub use calculation::StepCalculation;
pub use dipole::{Direction, DipoleSet};
pub use electronic::ElectronicData;
pub use overlap::OverlapSet;
pub use structure::{Atom, Crystal, Lattice};
