//! # 缺陷能带定位
//!
//! 在费米能级附近的能带窗口内，寻找参与数最小（最局域）的态。
//!
//! ## 算法概述
//! 1. 每个自旋通道：能带最大值低于费米能级的能带数记为 n_occ，
//!    窗口取 [n_occ - w, n_occ + w)
//! 2. 每个 k 点独立选出窗口内参与数最小的能带
//! 3. 选择候选态平均参与数最小的自旋通道
//! 4. 各 k 点能带不一致或局域性不突出时给出警告，但仍返回最佳猜测
//!
//! 调用者也可以直接给出缺陷能带，完全跳过检测。
//!
//! ## 依赖关系
//! - 被 `defect/harmonic.rs` 和 `commands/locate.rs` 调用
//! - 使用 `models/electronic.rs` 的 ElectronicData

use crate::error::{DefectError, Result};
use crate::models::{BandIndex, DefectBand, ElectronicData, Spin};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 参与数相等判定的相对容差
const SCORE_RTOL: f64 = 1e-12;

/// 同一 k 点上多个能带局域性相同时的取舍策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// 取最接近费米能级的能带
    #[default]
    ClosestToFermi,
    /// 取下标最小的能带
    LowestBand,
    /// 取下标最大的能带
    HighestBand,
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TieBreak::ClosestToFermi => write!(f, "closest-to-fermi"),
            TieBreak::LowestBand => write!(f, "lowest-band"),
            TieBreak::HighestBand => write!(f, "highest-band"),
        }
    }
}

/// 定位参数
#[derive(Debug, Clone)]
pub struct LocatorOptions {
    /// 费米能级上下各搜索的能带数
    pub band_window: usize,
    /// 局域性相同时的取舍策略
    pub tie_break: TieBreak,
    /// 最佳/次佳参与数之比超过该值时视为局域性不突出
    pub isolation_ratio: f64,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        LocatorOptions {
            band_window: 7,
            tie_break: TieBreak::default(),
            isolation_ratio: 0.8,
        }
    }
}

/// 缺陷能带来源：显式给出或由局域性检测
#[derive(Debug, Clone)]
pub enum DefectBandSource {
    Explicit(DefectBand),
    Detected(LocatorOptions),
}

impl Default for DefectBandSource {
    fn default() -> Self {
        DefectBandSource::Detected(LocatorOptions::default())
    }
}

/// 单个 k 点上的候选缺陷态
#[derive(Debug, Clone)]
pub struct Candidate {
    pub index: BandIndex,
    /// 参与数
    pub score: f64,
    /// 本征值 (eV)
    pub eigenvalue: f64,
    /// 窗口内次佳参与数（窗口只有一个能带时为 None）
    pub runner_up: Option<f64>,
}

/// 检测结果
#[derive(Debug, Clone)]
pub struct Detection {
    pub band: DefectBand,
    /// 选中自旋通道的逐 k 点候选
    pub candidates: Vec<Candidate>,
    /// 各自旋通道的平均参与数
    pub spin_scores: Vec<(Spin, f64)>,
    /// 检测是否不明确
    pub ambiguous: bool,
    /// 不明确的原因
    pub notes: Vec<String>,
}

/// 参与数 1/Σp²
///
/// 对归一化的投影，完全局域在单个轨道上时为 1，越离域越大。
pub fn participation_number(projections: &[f64]) -> f64 {
    let sum_sq: f64 = projections.iter().map(|p| p * p).sum();
    if sum_sq > 0.0 {
        1.0 / sum_sq
    } else {
        f64::INFINITY
    }
}

/// 缺陷能带定位器
pub struct DefectBandLocator {
    options: LocatorOptions,
}

impl DefectBandLocator {
    pub fn new(options: LocatorOptions) -> Self {
        Self { options }
    }

    /// 能带搜索窗口 [lo, hi)
    pub fn band_window(&self, data: &ElectronicData, spin: usize) -> (usize, usize) {
        let n_occ = data.count_below_fermi(spin);
        let lo = n_occ.saturating_sub(self.options.band_window);
        let hi = (n_occ + self.options.band_window).min(data.nbands());
        (lo, hi)
    }

    /// 检测缺陷能带
    pub fn locate(&self, data: &ElectronicData) -> Result<Detection> {
        let scores = data
            .localization
            .as_ref()
            .ok_or_else(|| DefectError::MissingInput("localization scores (ipr)".to_string()))?;

        let mut per_spin: Vec<(Spin, f64, Vec<Candidate>)> = Vec::new();

        for ispin in 0..data.nspins() {
            let spin = Spin::from_index(ispin)?;
            let (lo, hi) = self.band_window(data, ispin);
            if lo >= hi {
                continue;
            }

            let mut candidates = Vec::with_capacity(data.nkpoints());
            for ik in 0..data.nkpoints() {
                candidates.push(self.select_at_kpoint(data, scores, ispin, ik, lo, hi)?);
            }

            let avg = candidates.iter().map(|c| c.score).sum::<f64>() / candidates.len() as f64;
            per_spin.push((spin, avg, candidates));
        }

        let spin_scores: Vec<(Spin, f64)> = per_spin.iter().map(|(s, a, _)| (*s, *a)).collect();

        // 平均参与数最小的自旋；相等时保留靠前的自旋
        let (_, _, candidates) = per_spin
            .into_iter()
            .reduce(|best, next| {
                if compare_scores(next.1, best.1) == Ordering::Less {
                    next
                } else {
                    best
                }
            })
            .ok_or_else(|| {
                DefectError::DetectionFailed("empty band window in every spin channel".to_string())
            })?;

        let band = DefectBand::new(candidates.iter().map(|c| c.index).collect())?;

        let mut notes = Vec::new();
        if !band.is_consistent() {
            let bands: Vec<String> = candidates.iter().map(|c| c.index.band.to_string()).collect();
            notes.push(format!(
                "defect band index differs between k-points: [{}]",
                bands.join(", ")
            ));
        }
        for c in &candidates {
            if let Some(second) = c.runner_up {
                if second > 0.0 && c.score / second > self.options.isolation_ratio {
                    notes.push(format!(
                        "state {} is not clearly localized (score {:.4} vs next {:.4})",
                        c.index, c.score, second
                    ));
                }
            }
        }

        for note in &notes {
            log::warn!("Ambiguous defect band: {}", note);
        }

        Ok(Detection {
            band,
            candidates,
            spin_scores,
            ambiguous: !notes.is_empty(),
            notes,
        })
    }

    /// 单个 k 点上选出参与数最小的能带
    fn select_at_kpoint(
        &self,
        data: &ElectronicData,
        scores: &ndarray::Array3<f64>,
        ispin: usize,
        ik: usize,
        lo: usize,
        hi: usize,
    ) -> Result<Candidate> {
        let mut best: Option<usize> = None;

        for ib in lo..hi {
            let score = scores[[ispin, ik, ib]];
            if score.is_nan() {
                return Err(DefectError::InvalidData(format!(
                    "NaN localization score at band {}, k-point {}, spin {}",
                    ib, ik, ispin
                )));
            }
            let current = match best {
                None => {
                    best = Some(ib);
                    continue;
                }
                Some(b) => b,
            };

            match compare_scores(score, scores[[ispin, ik, current]]) {
                Ordering::Less => best = Some(ib),
                Ordering::Greater => {}
                Ordering::Equal => {
                    if self.prefers(data, ispin, ik, ib, current) {
                        best = Some(ib);
                    }
                }
            }
        }

        let chosen = best.ok_or_else(|| {
            DefectError::DetectionFailed(format!("empty band window at k-point {}", ik))
        })?;

        let runner_up = (lo..hi)
            .filter(|&ib| ib != chosen)
            .map(|ib| scores[[ispin, ik, ib]])
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))));

        Ok(Candidate {
            index: BandIndex::new(chosen, ik, Spin::from_index(ispin)?),
            score: scores[[ispin, ik, chosen]],
            eigenvalue: data.eigenvalues[[ispin, ik, chosen]],
            runner_up,
        })
    }

    /// 局域性相同时，`challenger` 是否优于 `current`（challenger 下标更大）
    fn prefers(
        &self,
        data: &ElectronicData,
        ispin: usize,
        ik: usize,
        challenger: usize,
        current: usize,
    ) -> bool {
        match self.options.tie_break {
            TieBreak::LowestBand => false,
            TieBreak::HighestBand => true,
            TieBreak::ClosestToFermi => {
                let d_new = (data.eigenvalues[[ispin, ik, challenger]] - data.efermi).abs();
                let d_old = (data.eigenvalues[[ispin, ik, current]] - data.efermi).abs();
                // 距离也相同时保留下标较小的能带
                compare_scores(d_new, d_old) == Ordering::Less
            }
        }
    }
}

/// 带相对容差的比较
fn compare_scores(a: f64, b: f64) -> Ordering {
    let scale = a.abs().max(b.abs());
    if (a - b).abs() <= SCORE_RTOL * scale {
        Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 1 个自旋、2 个 k 点、6 个能带，能带 3 为局域缺陷态
    fn sample(scores: Vec<f64>) -> ElectronicData {
        let eig = Array3::from_shape_vec(
            (1, 2, 6),
            vec![
                -3.0, -2.0, -1.0, 0.2, 1.5, 2.5, //
                -3.1, -2.1, -1.1, 0.25, 1.6, 2.6,
            ],
        )
        .unwrap();
        let ipr = Array3::from_shape_vec((1, 2, 6), scores).unwrap();
        ElectronicData::new(0.0, eig).with_localization(ipr).unwrap()
    }

    fn clear_scores() -> Vec<f64> {
        vec![
            50.0, 48.0, 45.0, 3.0, 40.0, 42.0, //
            51.0, 47.0, 44.0, 3.2, 41.0, 43.0,
        ]
    }

    #[test]
    fn test_participation_number() {
        assert!((participation_number(&[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!((participation_number(&[0.5, 0.5]) - 2.0).abs() < 1e-12);
        assert!(participation_number(&[0.0, 0.0]).is_infinite());
    }

    #[test]
    fn test_locate_clear_defect() {
        let data = sample(clear_scores());
        let detection = DefectBandLocator::new(LocatorOptions::default())
            .locate(&data)
            .unwrap();

        assert!(!detection.ambiguous);
        assert_eq!(detection.band.entries().len(), 2);
        assert!(detection.band.entries().iter().all(|e| e.band == 3));
        assert_eq!(detection.band.entries()[1].kpoint, 1);
    }

    #[test]
    fn test_locate_is_idempotent() {
        let data = sample(clear_scores());
        let locator = DefectBandLocator::new(LocatorOptions::default());
        let first = locator.locate(&data).unwrap();
        let second = locator.locate(&data).unwrap();
        assert_eq!(first.band, second.band);
    }

    #[test]
    fn test_band_window_bounds() {
        let data = sample(clear_scores());
        let locator = DefectBandLocator::new(LocatorOptions {
            band_window: 1,
            ..Default::default()
        });
        // 3 bands have their maximum below E_F = 0
        assert_eq!(locator.band_window(&data, 0), (2, 4));
    }

    #[test]
    fn test_tie_break_closest_to_fermi() {
        // bands 2 (-1.0 eV) and 3 (0.2 eV) share the same score
        let mut scores = clear_scores();
        scores[2] = 3.0;
        scores[8] = 3.2;
        let data = sample(scores);

        let closest = DefectBandLocator::new(LocatorOptions::default())
            .locate(&data)
            .unwrap();
        assert_eq!(closest.band.entries()[0].band, 3);

        let lowest = DefectBandLocator::new(LocatorOptions {
            tie_break: TieBreak::LowestBand,
            ..Default::default()
        })
        .locate(&data)
        .unwrap();
        assert_eq!(lowest.band.entries()[0].band, 2);
        // a tie is never clearly isolated
        assert!(lowest.ambiguous);
    }

    #[test]
    fn test_inconsistent_bands_are_ambiguous_not_fatal() {
        let mut scores = clear_scores();
        // k-point 1: band 4 becomes the most localized
        scores[9] = 30.0;
        scores[10] = 2.0;
        let data = sample(scores);

        let detection = DefectBandLocator::new(LocatorOptions::default())
            .locate(&data)
            .unwrap();
        assert!(detection.ambiguous);
        assert_eq!(detection.band.entries()[0].band, 3);
        assert_eq!(detection.band.entries()[1].band, 4);
    }

    #[test]
    fn test_spin_channel_selection() {
        let eig = Array3::from_shape_vec(
            (2, 1, 4),
            vec![-2.0, -1.0, 0.3, 2.0, -2.0, -1.0, 0.4, 2.0],
        )
        .unwrap();
        let ipr = Array3::from_shape_vec(
            (2, 1, 4),
            vec![40.0, 30.0, 10.0, 35.0, 40.0, 30.0, 2.0, 35.0],
        )
        .unwrap();
        let data = ElectronicData::new(0.0, eig).with_localization(ipr).unwrap();

        let detection = DefectBandLocator::new(LocatorOptions::default())
            .locate(&data)
            .unwrap();
        assert_eq!(detection.band.entries()[0].spin, Spin::Down);
        assert_eq!(detection.spin_scores.len(), 2);
    }

    #[test]
    fn test_missing_scores() {
        let eig = Array3::zeros((1, 1, 4));
        let data = ElectronicData::new(0.0, eig);
        assert!(matches!(
            DefectBandLocator::new(LocatorOptions::default()).locate(&data),
            Err(DefectError::MissingInput(_))
        ));
    }
}
