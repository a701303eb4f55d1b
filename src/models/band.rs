//! # 能带索引数据模型
//!
//! `BandIndex` 标识单个电子态 (band, k-point, spin)；
//! `DefectBand` 是在各 k 点上追踪同一缺陷态的索引集合。
//!
//! ## 依赖关系
//! - 被 `defect/` 各计算模块使用
//! - 被 `parsers/json.rs` 使用

use crate::error::{DefectError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 自旋通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Spin {
    Up,
    Down,
}

impl Spin {
    /// 数组中的自旋下标 (Up = 0, Down = 1)
    pub fn index(self) -> usize {
        match self {
            Spin::Up => 0,
            Spin::Down => 1,
        }
    }

    pub fn from_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(Spin::Up),
            1 => Ok(Spin::Down),
            _ => Err(DefectError::IndexOutOfRange(format!(
                "spin index {} (expected 0 or 1)",
                index
            ))),
        }
    }
}

impl std::fmt::Display for Spin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Spin::Up => write!(f, "up"),
            Spin::Down => write!(f, "down"),
        }
    }
}

/// 单个电子态索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BandIndex {
    /// 能带下标（从 0 开始）
    pub band: usize,
    /// k 点下标
    pub kpoint: usize,
    /// 自旋通道
    pub spin: Spin,
}

impl BandIndex {
    pub fn new(band: usize, kpoint: usize, spin: Spin) -> Self {
        BandIndex { band, kpoint, spin }
    }
}

impl std::fmt::Display for BandIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(band {}, k {}, spin {})", self.band, self.kpoint, self.spin)
    }
}

/// 缺陷能带
///
/// 每个 (k-point, spin) 最多出现一次，保持调用者给出的顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectBand {
    entries: Vec<BandIndex>,
}

impl DefectBand {
    /// 创建缺陷能带，拒绝重复的 (k-point, spin)
    pub fn new(entries: Vec<BandIndex>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert((entry.kpoint, entry.spin)) {
                return Err(DefectError::DuplicateBandEntry {
                    kpoint: entry.kpoint,
                    spin: entry.spin.index(),
                });
            }
        }
        Ok(DefectBand { entries })
    }

    pub fn entries(&self) -> &[BandIndex] {
        &self.entries
    }

    /// 涉及的不同 k 点数
    pub fn nkpoints(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.kpoint)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// 查找指定 (k-point, spin) 上的缺陷态
    pub fn get(&self, kpoint: usize, spin: Spin) -> Option<&BandIndex> {
        self.entries
            .iter()
            .find(|e| e.kpoint == kpoint && e.spin == spin)
    }

    /// 指定 k 点上的缺陷态（任一自旋，取第一个）
    pub fn at_kpoint(&self, kpoint: usize) -> Option<&BandIndex> {
        self.entries.iter().find(|e| e.kpoint == kpoint)
    }

    /// 代表性缺陷态：第一个条目
    pub fn representative(&self) -> Option<&BandIndex> {
        self.entries.first()
    }

    /// 所有 k 点上的能带下标是否一致
    pub fn is_consistent(&self) -> bool {
        match self.entries.first() {
            Some(first) => self.entries.iter().all(|e| e.band == first.band),
            None => true,
        }
    }
}
