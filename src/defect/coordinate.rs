//! # 位形坐标
//!
//! 只能计算正定距离（如两个结构之间的质量加权位移）时，
//! 借助两个参考点给出沿一条直线的有符号坐标。
//!
//! ## 规则
//! 参考点 1 为零点，参考点 2 决定正方向。某点离参考点 1 比离参考点 2 近，
//! 且离参考点 2 的距离大于两参考点间距时，该点位于负方向。
//! 仅当所有点大致共线时有意义。
//!
//! ## 依赖关系
//! - 被 `defect/harmonic.rs` 调用
//! - 使用 `models/structure.rs` 的质量加权距离

use crate::error::{DefectError, Result};
use crate::models::Crystal;

/// 沿直线的有符号坐标
pub fn signed_line_coordinates<T, F>(items: &[T], ref1: &T, ref2: &T, dist: F) -> Result<Vec<f64>>
where
    F: Fn(&T, &T) -> Result<f64>,
{
    let d0 = dist(ref1, ref2)?;

    items
        .iter()
        .map(|item| {
            let q1 = dist(item, ref1)?;
            let q2 = dist(item, ref2)?;
            let sign = if q1 < q2 && q2 > d0 { -1.0 } else { 1.0 };
            Ok(sign * q1)
        })
        .collect()
}

/// 从结构序列推导畸变坐标 Q（相对弛豫结构）
///
/// 参考点 2 取离弛豫结构最远的结构。
pub fn distortions_from_structures(structures: &[&Crystal], relaxed_index: usize) -> Result<Vec<f64>> {
    let relaxed = structures.get(relaxed_index).ok_or_else(|| {
        DefectError::IndexOutOfRange(format!(
            "relaxed index {} for {} structures",
            relaxed_index,
            structures.len()
        ))
    })?;

    let from_relaxed = structures
        .iter()
        .map(|s| relaxed.mass_weighted_distance(s))
        .collect::<Result<Vec<f64>>>()?;

    let far_index = from_relaxed
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(relaxed_index);

    if from_relaxed[far_index] <= 0.0 {
        return Err(DefectError::InvalidData(
            "all structures are identical; cannot build a distortion coordinate".to_string(),
        ));
    }

    signed_line_coordinates(structures, relaxed, &structures[far_index], |a, b| {
        a.mass_weighted_distance(b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn displaced(x: f64) -> Crystal {
        let lattice = Lattice::from_vectors([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]);
        Crystal::new(
            lattice,
            vec![
                Atom::new("H", [0.5 + x, 0.5, 0.5]),
                Atom::new("H", [0.2, 0.2, 0.2]),
            ],
        )
    }

    #[test]
    fn test_signed_line_coordinates_scalar() {
        let points = [-2.0, -1.0, 0.0, 1.0, 3.0];
        let coords =
            signed_line_coordinates(&points, &0.0, &3.0, |a: &f64, b: &f64| Ok((a - b).abs())).unwrap();
        assert_eq!(coords, vec![-2.0, -1.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn test_distortions_from_structures() {
        let structures = [displaced(-0.01), displaced(0.0), displaced(0.01), displaced(0.02)];
        let refs: Vec<&Crystal> = structures.iter().collect();
        let q = distortions_from_structures(&refs, 1).unwrap();

        let unit = 0.1 * 1.008_f64.sqrt();
        assert!((q[0] + unit).abs() < 1e-9);
        assert!(q[1].abs() < 1e-12);
        assert!((q[2] - unit).abs() < 1e-9);
        assert!((q[3] - 2.0 * unit).abs() < 1e-9);
    }

    #[test]
    fn test_distortions_identical_structures() {
        let structures = [displaced(0.0), displaced(0.0)];
        let refs: Vec<&Crystal> = structures.iter().collect();
        assert!(distortions_from_structures(&refs, 0).is_err());
    }
}
