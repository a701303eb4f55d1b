//! # 谐振缺陷
//!
//! 一个电荷态的位形坐标扫描：畸变步序列、弛豫步下标、缺陷能带和谐振拟合。
//!
//! ## 生命周期
//! ```text
//! Constructed ──locate──▶ BandLocated ──build──▶ PesFitted ──with_overlaps──▶ OverlapAttached
//! ```
//! 状态只进不退。前两个状态属于 `HarmonicDefectBuilder`，
//! 构建完成后的 `HarmonicDefect` 不可变，附加交叠矩阵或偶极矩阵元
//! 会消耗旧值并返回新值。
//!
//! ## 依赖关系
//! - 被 `defect/elph.rs`, `defect/optics.rs`, `defect/srh.rs` 使用
//! - 被 `commands/` 各子命令使用
//! - 使用 `defect/locator.rs`, `defect/coordinate.rs`, `defect/pes.rs`

use crate::defect::coordinate;
use crate::defect::locator::{DefectBandLocator, DefectBandSource, Detection};
use crate::defect::pes::{self, HarmonicFit};
use crate::error::{DefectError, Result};
use crate::models::{Crystal, DefectBand, DipoleSet, ElectronicData, OverlapSet, StepCalculation};

/// 谐振缺陷所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Constructed,
    BandLocated,
    PesFitted,
    OverlapAttached,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Constructed => write!(f, "constructed"),
            Stage::BandLocated => write!(f, "band-located"),
            Stage::PesFitted => write!(f, "PES-fitted"),
            Stage::OverlapAttached => write!(f, "overlap-attached"),
        }
    }
}

/// 谐振缺陷构建器
pub struct HarmonicDefectBuilder {
    name: String,
    charge_state: Option<i32>,
    steps: Vec<StepCalculation>,
    relaxed_index: Option<usize>,
    source: DefectBandSource,
    located: Option<(DefectBand, Option<Detection>)>,
}

impl HarmonicDefectBuilder {
    pub fn new(steps: Vec<StepCalculation>) -> Self {
        HarmonicDefectBuilder {
            name: "defect".to_string(),
            charge_state: None,
            steps,
            relaxed_index: None,
            source: DefectBandSource::default(),
            located: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn charge_state(mut self, charge: i32) -> Self {
        self.charge_state = Some(charge);
        self
    }

    /// 弛豫步下标；未指定时取能量最低的步
    pub fn relaxed_index(mut self, index: usize) -> Self {
        self.relaxed_index = Some(index);
        self
    }

    pub fn defect_band(mut self, source: DefectBandSource) -> Self {
        self.source = source;
        self.located = None;
        self
    }

    pub fn stage(&self) -> Stage {
        if self.located.is_some() {
            Stage::BandLocated
        } else {
            Stage::Constructed
        }
    }

    pub fn steps(&self) -> &[StepCalculation] {
        &self.steps
    }

    /// 已解析的缺陷能带及检测结果（BandLocated 之后可用）
    pub fn located(&self) -> Option<(&DefectBand, Option<&Detection>)> {
        self.located
            .as_ref()
            .map(|(band, detection)| (band, detection.as_ref()))
    }

    /// 弛豫步下标
    pub fn resolve_relaxed_index(&self) -> Result<usize> {
        if self.steps.is_empty() {
            return Err(DefectError::MissingInput("distortion steps".to_string()));
        }
        match self.relaxed_index {
            Some(i) if i < self.steps.len() => Ok(i),
            Some(i) => Err(DefectError::IndexOutOfRange(format!(
                "relaxed index {} for {} steps",
                i,
                self.steps.len()
            ))),
            None => Ok(self
                .steps
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.energy.total_cmp(&b.1.energy))
                .map(|(i, _)| i)
                .unwrap_or(0)),
        }
    }

    /// Constructed → BandLocated
    pub fn locate(mut self) -> Result<Self> {
        if self.located.is_some() {
            return Ok(self);
        }
        let relaxed = self.resolve_relaxed_index()?;
        let electronic = self.steps[relaxed].electronic.as_ref();

        let located = match &self.source {
            DefectBandSource::Explicit(band) => {
                if let Some(data) = electronic {
                    for entry in band.entries() {
                        data.check_index(entry)?;
                    }
                }
                (band.clone(), None)
            }
            DefectBandSource::Detected(options) => {
                let data = electronic.ok_or_else(|| {
                    DefectError::MissingInput(format!(
                        "electronic data on relaxed step '{}' for defect band detection",
                        self.steps[relaxed].name
                    ))
                })?;
                let detection = DefectBandLocator::new(options.clone()).locate(data)?;
                (detection.band.clone(), Some(detection))
            }
        };

        self.located = Some(located);
        Ok(self)
    }

    /// BandLocated → PesFitted
    pub fn build(self) -> Result<HarmonicDefect> {
        let this = self.locate()?;
        let relaxed_index = this.resolve_relaxed_index()?;
        let (defect_band, detection) = this
            .located
            .ok_or_else(|| DefectError::Other("defect band was not resolved".to_string()))?;

        let (distortions, reference_q) = distortion_coordinates(&this.steps, relaxed_index)?;

        let samples: Vec<(f64, f64)> = distortions
            .iter()
            .zip(this.steps.iter())
            .map(|(q, step)| (*q, step.energy))
            .collect();
        let fit = pes::fit_harmonic(&samples)?;

        Ok(HarmonicDefect {
            name: this.name,
            charge_state: this.charge_state,
            steps: this.steps,
            distortions,
            reference_q,
            relaxed_index,
            defect_band,
            detection,
            fit,
            overlaps: None,
            dipoles: None,
        })
    }
}

/// 相对弛豫步的畸变坐标，以及弛豫步在共享坐标中的绝对位置
///
/// 所有步都显式给出 Q 时使用显式值；否则要求所有步都有结构。
fn distortion_coordinates(steps: &[StepCalculation], relaxed: usize) -> Result<(Vec<f64>, Option<f64>)> {
    let explicit: Option<Vec<f64>> = steps.iter().map(|s| s.distortion).collect();
    if let Some(q) = explicit {
        let q_ref = q[relaxed];
        return Ok((q.iter().map(|x| x - q_ref).collect(), Some(q_ref)));
    }

    let structures: Option<Vec<&Crystal>> = steps.iter().map(|s| s.structure.as_ref()).collect();
    match structures {
        Some(structures) => Ok((
            coordinate::distortions_from_structures(&structures, relaxed)?,
            None,
        )),
        None => Err(DefectError::MissingInput(
            "every step needs either an explicit distortion or a structure".to_string(),
        )),
    }
}

/// 谐振缺陷
#[derive(Debug, Clone)]
pub struct HarmonicDefect {
    name: String,
    charge_state: Option<i32>,
    steps: Vec<StepCalculation>,
    distortions: Vec<f64>,
    reference_q: Option<f64>,
    relaxed_index: usize,
    defect_band: DefectBand,
    detection: Option<Detection>,
    fit: HarmonicFit,
    overlaps: Option<OverlapSet>,
    dipoles: Option<DipoleSet>,
}

impl HarmonicDefect {
    pub fn builder(steps: Vec<StepCalculation>) -> HarmonicDefectBuilder {
        HarmonicDefectBuilder::new(steps)
    }

    pub fn stage(&self) -> Stage {
        if self.overlaps.is_some() {
            Stage::OverlapAttached
        } else {
            Stage::PesFitted
        }
    }

    /// 检查是否已到达指定阶段
    pub fn require(&self, stage: Stage, operation: &str) -> Result<()> {
        if self.stage() < stage {
            return Err(DefectError::StageRequired {
                operation: operation.to_string(),
                required: stage.to_string(),
                current: self.stage().to_string(),
            });
        }
        Ok(())
    }

    /// PesFitted → OverlapAttached（只能附加一次）
    pub fn with_overlaps(mut self, overlaps: OverlapSet) -> Result<Self> {
        if self.overlaps.is_some() {
            return Err(DefectError::InvalidArgument(format!(
                "overlaps are already attached to '{}'",
                self.name
            )));
        }
        if overlaps.is_empty() {
            return Err(DefectError::MissingInput("overlap matrices".to_string()));
        }
        if let Some(&step) = overlaps.steps().iter().find(|&&s| s >= self.steps.len()) {
            return Err(DefectError::IndexOutOfRange(format!(
                "overlap step {} for {} distortion steps",
                step,
                self.steps.len()
            )));
        }
        self.overlaps = Some(overlaps);
        Ok(self)
    }

    /// 附加光学响应输入（只能附加一次）
    pub fn with_dipoles(mut self, dipoles: DipoleSet) -> Result<Self> {
        if self.dipoles.is_some() {
            return Err(DefectError::InvalidArgument(format!(
                "dipoles are already attached to '{}'",
                self.name
            )));
        }
        let data = self.relaxed_electronic()?;
        let (nb, nk, ns) = dipoles.shape();
        if nb > data.nbands() || nk != data.nkpoints() || ns != data.nspins() {
            return Err(DefectError::InvalidData(format!(
                "dipole shape ({}, {}, {}) incompatible with eigenvalues ({}, {}, {})",
                nb,
                nk,
                ns,
                data.nbands(),
                data.nkpoints(),
                data.nspins()
            )));
        }
        self.dipoles = Some(dipoles);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn charge_state(&self) -> Option<i32> {
        self.charge_state
    }

    pub fn steps(&self) -> &[StepCalculation] {
        &self.steps
    }

    pub fn relaxed_index(&self) -> usize {
        self.relaxed_index
    }

    /// 相对弛豫步的畸变坐标 Q (amu^1/2 Å)
    pub fn distortions(&self) -> &[f64] {
        &self.distortions
    }

    pub fn energies(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.energy).collect()
    }

    pub fn defect_band(&self) -> &DefectBand {
        &self.defect_band
    }

    /// 检测结果；显式给出缺陷能带时为 None
    pub fn detection(&self) -> Option<&Detection> {
        self.detection.as_ref()
    }

    pub fn fit(&self) -> &HarmonicFit {
        &self.fit
    }

    pub fn omega(&self) -> f64 {
        self.fit.omega
    }

    /// ħω (eV)
    pub fn hbar_omega(&self) -> f64 {
        self.fit.hbar_omega()
    }

    /// 势能面最低点在共享坐标中的位置（仅显式给出 Q 时可用）
    pub fn shared_minimum(&self) -> Option<f64> {
        self.reference_q.map(|q_ref| q_ref + self.fit.q0)
    }

    pub fn relaxed_step(&self) -> &StepCalculation {
        &self.steps[self.relaxed_index]
    }

    pub fn relaxed_electronic(&self) -> Result<&ElectronicData> {
        self.relaxed_step().electronic.as_ref().ok_or_else(|| {
            DefectError::MissingInput(format!(
                "electronic data on relaxed step '{}'",
                self.relaxed_step().name
            ))
        })
    }

    pub fn relaxed_structure(&self) -> Option<&Crystal> {
        self.relaxed_step().structure.as_ref()
    }

    pub fn overlaps(&self) -> Option<&OverlapSet> {
        self.overlaps.as_ref()
    }

    pub fn dipoles(&self) -> Option<&DipoleSet> {
        self.dipoles.as_ref()
    }
}
