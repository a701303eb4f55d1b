//! # 电子结构数据模型
//!
//! 存储单个计算的本征值、占据数、k 点权重和局域化指标。
//! 所有三维数组的下标顺序为 (spin, k-point, band)。
//!
//! ## 依赖关系
//! - 被 `models/calculation.rs` 使用
//! - 被 `defect/locator.rs`, `defect/elph.rs`, `defect/optics.rs` 使用

use crate::error::{DefectError, Result};
use crate::models::BandIndex;

use ndarray::{Array1, Array3};

const OCCUPATION_TOL: f64 = 1e-6;

/// 单个计算的电子结构
#[derive(Debug, Clone)]
pub struct ElectronicData {
    /// 费米能级 (eV)
    pub efermi: f64,

    /// 本征值 (eV)，形状 (nspin, nkpt, nband)
    pub eigenvalues: Array3<f64>,

    /// 每个自旋轨道的占据数 (0..1)，形状同 `eigenvalues`
    pub occupations: Option<Array3<f64>>,

    /// k 点权重（未归一化）
    pub kweights: Array1<f64>,

    /// 参与数 1/Σp²（越小越局域），形状同 `eigenvalues`
    pub localization: Option<Array3<f64>>,
}

impl ElectronicData {
    /// 创建电子结构，k 点权重默认均匀
    pub fn new(efermi: f64, eigenvalues: Array3<f64>) -> Self {
        let nkpt = eigenvalues.dim().1;
        ElectronicData {
            efermi,
            eigenvalues,
            occupations: None,
            kweights: Array1::from_elem(nkpt, 1.0),
            localization: None,
        }
    }

    pub fn with_localization(mut self, localization: Array3<f64>) -> Result<Self> {
        if localization.dim() != self.eigenvalues.dim() {
            return Err(DefectError::InvalidData(format!(
                "localization shape {:?} does not match eigenvalues {:?}",
                localization.dim(),
                self.eigenvalues.dim()
            )));
        }
        self.localization = Some(localization);
        Ok(self)
    }

    pub fn with_occupations(mut self, occupations: Array3<f64>) -> Result<Self> {
        if occupations.dim() != self.eigenvalues.dim() {
            return Err(DefectError::InvalidData(format!(
                "occupation shape {:?} does not match eigenvalues {:?}",
                occupations.dim(),
                self.eigenvalues.dim()
            )));
        }
        if let Some(f) = occupations
            .iter()
            .find(|f| !(**f >= -OCCUPATION_TOL && **f <= 1.0 + OCCUPATION_TOL))
        {
            return Err(DefectError::InvalidData(format!(
                "occupations must lie in [0, 1] per spin orbital (got {})",
                f
            )));
        }
        self.occupations = Some(occupations);
        Ok(self)
    }

    pub fn with_kweights(mut self, kweights: Array1<f64>) -> Result<Self> {
        if kweights.len() != self.nkpoints() {
            return Err(DefectError::InvalidData(format!(
                "{} k-point weights for {} k-points",
                kweights.len(),
                self.nkpoints()
            )));
        }
        self.kweights = kweights;
        Ok(self)
    }

    pub fn nspins(&self) -> usize {
        self.eigenvalues.dim().0
    }

    pub fn nkpoints(&self) -> usize {
        self.eigenvalues.dim().1
    }

    pub fn nbands(&self) -> usize {
        self.eigenvalues.dim().2
    }

    /// 检查态索引是否在范围内
    pub fn check_index(&self, index: &BandIndex) -> Result<()> {
        let (ns, nk, nb) = self.eigenvalues.dim();
        if index.spin.index() >= ns || index.kpoint >= nk || index.band >= nb {
            return Err(DefectError::IndexOutOfRange(format!(
                "state {} outside eigenvalue array of shape ({}, {}, {})",
                index, ns, nk, nb
            )));
        }
        Ok(())
    }

    /// 单个态的本征值
    pub fn eigenvalue(&self, index: &BandIndex) -> Result<f64> {
        self.check_index(index)?;
        Ok(self.eigenvalues[[index.spin.index(), index.kpoint, index.band]])
    }

    /// 各能带在所有 k 点上的最大本征值
    pub fn band_maxima(&self, spin: usize) -> Vec<f64> {
        let eig = self.eigenvalues.index_axis(ndarray::Axis(0), spin);
        (0..self.nbands())
            .map(|ib| {
                eig.column(ib)
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .collect()
    }

    /// 最大本征值完全低于费米能级的能带数
    ///
    /// 能带最大值按下标升序排列，二分查找第一个不低于费米能级的位置。
    pub fn count_below_fermi(&self, spin: usize) -> usize {
        self.band_maxima(spin)
            .partition_point(|&emax| emax < self.efermi)
    }

    /// 是否为自旋极化计算
    pub fn is_spin_polarized(&self) -> bool {
        self.nspins() == 2
    }
}
