//! # 畸变步计算结果数据模型
//!
//! 位形坐标扫描中单个畸变结构的 DFT 结果。
//!
//! ## 依赖关系
//! - 被 `parsers/json.rs` 构造
//! - 被 `defect/harmonic.rs` 使用

use crate::models::{Crystal, ElectronicData};

/// 单个畸变步的计算结果
#[derive(Debug, Clone)]
pub struct StepCalculation {
    /// 步名称（通常是计算目录名）
    pub name: String,

    /// 总能量 (eV)
    pub energy: f64,

    /// 显式给出的畸变坐标 Q (amu^1/2 Å)
    pub distortion: Option<f64>,

    /// 超胞结构
    pub structure: Option<Crystal>,

    /// 电子结构（弛豫步必须提供才能识别缺陷能带）
    pub electronic: Option<ElectronicData>,
}

impl StepCalculation {
    pub fn new(name: impl Into<String>, energy: f64) -> Self {
        StepCalculation {
            name: name.into(),
            energy,
            distortion: None,
            structure: None,
            electronic: None,
        }
    }

    pub fn with_distortion(mut self, q: f64) -> Self {
        self.distortion = Some(q);
        self
    }

    pub fn with_structure(mut self, structure: Crystal) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_electronic(mut self, electronic: ElectronicData) -> Self {
        self.electronic = Some(electronic);
        self
    }
}
