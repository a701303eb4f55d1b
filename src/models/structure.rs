//! # 晶体结构数据模型
//!
//! 畸变步的超胞结构，用于推导质量加权位形坐标 Q 和超胞体积。
//!
//! ## 依赖关系
//! - 被 `models/calculation.rs` 和 `defect/coordinate.rs` 使用
//! - 使用 `models/elements.rs` 获取原子质量

use crate::error::{DefectError, Result};
use crate::models::elements;

use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 计算晶格体积
    pub fn volume(&self) -> f64 {
        let a = self.matrix[0];
        let b = self.matrix[1];
        let c = self.matrix[2];

        // 行列式计算
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 分数坐标转笛卡尔坐标
    pub fn to_cartesian(&self, frac: &[f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }
}

/// 原子信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crystal {
    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal { lattice, atoms }
    }

    /// 超胞体积 (Å³)
    pub fn volume(&self) -> f64 {
        self.lattice.volume().abs()
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 质量加权距离 sqrt(Σ m_a |Δr_a|²)，单位 amu^1/2 Å
    ///
    /// 两个结构必须原子数和元素顺序一致；分数坐标差取最小像。
    /// 笛卡尔位移使用本结构的晶格。
    pub fn mass_weighted_distance(&self, other: &Crystal) -> Result<f64> {
        if self.atoms.len() != other.atoms.len() {
            return Err(DefectError::InvalidData(format!(
                "structures have {} and {} atoms",
                self.atoms.len(),
                other.atoms.len()
            )));
        }

        let mut sum = 0.0;
        for (a, b) in self.atoms.iter().zip(other.atoms.iter()) {
            if a.element != b.element {
                return Err(DefectError::InvalidData(format!(
                    "atom order differs: {} vs {}",
                    a.element, b.element
                )));
            }
            let mass = elements::atomic_mass(&a.element).ok_or_else(|| {
                DefectError::InvalidData(format!("unknown element '{}'", a.element))
            })?;

            let mut dfrac = [0.0; 3];
            for i in 0..3 {
                let d = b.position[i] - a.position[i];
                dfrac[i] = d - d.round();
            }
            let dcart = self.lattice.to_cartesian(&dfrac);
            sum += mass * (dcart[0].powi(2) + dcart[1].powi(2) + dcart[2].powi(2));
        }

        Ok(sum.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Lattice {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let vol = cubic(5.0).volume().abs();

        // 5^3 = 125
        assert!((vol - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_crystal_formula() {
        let atoms = vec![
            Atom::new("Ga", [0.0, 0.0, 0.0]),
            Atom::new("Ga", [0.5, 0.5, 0.0]),
            Atom::new("N", [0.25, 0.25, 0.25]),
        ];
        let crystal = Crystal::new(cubic(5.0), atoms);
        assert_eq!(crystal.formula(), "Ga2N");
    }

    #[test]
    fn test_mass_weighted_distance() {
        let a = Crystal::new(cubic(10.0), vec![Atom::new("C", [0.0, 0.0, 0.0])]);
        let b = Crystal::new(cubic(10.0), vec![Atom::new("C", [0.01, 0.0, 0.0])]);

        // 0.1 Å * sqrt(12.011)
        let d = a.mass_weighted_distance(&b).unwrap();
        assert!((d - 0.1 * 12.011_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_mass_weighted_distance_minimum_image() {
        let a = Crystal::new(cubic(10.0), vec![Atom::new("H", [0.995, 0.0, 0.0])]);
        let b = Crystal::new(cubic(10.0), vec![Atom::new("H", [0.005, 0.0, 0.0])]);

        let d = a.mass_weighted_distance(&b).unwrap();
        assert!((d - 0.1 * 1.008_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_mass_weighted_distance_mismatch() {
        let a = Crystal::new(cubic(10.0), vec![Atom::new("H", [0.0, 0.0, 0.0])]);
        let b = Crystal::new(cubic(10.0), vec![Atom::new("He", [0.0, 0.0, 0.0])]);
        assert!(a.mass_weighted_distance(&b).is_err());
    }
}
