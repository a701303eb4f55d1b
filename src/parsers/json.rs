//! # JSON 中间格式解析器
//!
//! ## 缺陷文件
//! ```text
//! { "name": "C_N", "charge_state": 0, "relaxed_index": 2,
//!   "defect_band": [[band, kpoint, spin], ...],
//!   "steps": [ { "name", "energy", "distortion"?, "structure"?, "electronic"? } ] }
//! ```
//! `electronic` 中的三维数组下标顺序为 [spin][k-point][band]。
//! `occupations` 为每个自旋轨道的占据数 (0..1)，给出时光学响应直接使用。
//! 给出 `projections`（[spin][k][band][site/orbital]）而没有 `ipr` 时，
//! 局域化指标取投影的参与数。
//!
//! ## 交叠文件
//! ```text
//! { "entries": [ { "step", "spin", "kpoint", "real": [[..]], "imag"?: [[..]] } ] }
//! ```
//!
//! ## 偶极文件
//! ```text
//! { "nbands", "nkpoints", "nspins",
//!   "elements": [ { "band_i", "band_j", "kpoint", "spin", "x": [re, im], "y", "z" } ] }
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/` 和 `defect/locator.rs`
//! - 使用 `serde_json` 反序列化

use crate::defect::{
    participation_number, DefectBandSource, HarmonicDefect, HarmonicDefectBuilder, LocatorOptions,
};
use crate::error::{DefectError, Result};
use crate::models::{
    Atom, BandIndex, Crystal, DefectBand, DipoleSet, ElectronicData, Lattice, OverlapSet, Spin,
    StepCalculation,
};
use crate::parsers::read_text;

use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use serde::Deserialize;
use std::path::Path;

// ─────────────────────────────────────────────────────────────
// 缺陷文件
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DefectFile {
    name: Option<String>,
    charge_state: Option<i32>,
    relaxed_index: Option<usize>,
    defect_band: Option<Vec<[usize; 3]>>,
    steps: Vec<StepRecord>,
}

#[derive(Debug, Deserialize)]
struct StepRecord {
    name: Option<String>,
    energy: f64,
    distortion: Option<f64>,
    structure: Option<StructureRecord>,
    electronic: Option<ElectronicRecord>,
}

#[derive(Debug, Deserialize)]
struct StructureRecord {
    lattice: [[f64; 3]; 3],
    atoms: Vec<AtomRecord>,
}

#[derive(Debug, Deserialize)]
struct AtomRecord {
    element: String,
    position: [f64; 3],
}

#[derive(Debug, Deserialize)]
struct ElectronicRecord {
    efermi: f64,
    eigenvalues: Vec<Vec<Vec<f64>>>,
    occupations: Option<Vec<Vec<Vec<f64>>>>,
    kweights: Option<Vec<f64>>,
    ipr: Option<Vec<Vec<Vec<f64>>>>,
    projections: Option<Vec<Vec<Vec<Vec<f64>>>>>,
}

/// 缺陷文件内容
#[derive(Debug, Clone)]
pub struct DefectInput {
    pub name: String,
    pub charge_state: Option<i32>,
    pub relaxed_index: Option<usize>,
    /// 文件中显式给出的缺陷能带
    pub defect_band: Option<DefectBand>,
    pub steps: Vec<StepCalculation>,
}

impl DefectInput {
    /// 转换为构建器；文件给出缺陷能带时跳过检测
    pub fn into_builder(self, locator: LocatorOptions) -> HarmonicDefectBuilder {
        let source = match self.defect_band {
            Some(band) => DefectBandSource::Explicit(band),
            None => DefectBandSource::Detected(locator),
        };
        let mut builder = HarmonicDefect::builder(self.steps)
            .name(self.name)
            .defect_band(source);
        if let Some(q) = self.charge_state {
            builder = builder.charge_state(q);
        }
        if let Some(i) = self.relaxed_index {
            builder = builder.relaxed_index(i);
        }
        builder
    }
}

fn parse_error(path: &str, reason: impl std::fmt::Display) -> DefectError {
    DefectError::ParseError {
        format: "JSON".to_string(),
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// 解析缺陷文件
pub fn parse_defect_file(path: &Path) -> Result<DefectInput> {
    let content = read_text(path)?;
    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("defect");
    parse_defect_content(&content, &path.display().to_string(), default_name)
}

/// 从字符串内容解析缺陷文件
pub fn parse_defect_content(content: &str, source: &str, default_name: &str) -> Result<DefectInput> {
    let file: DefectFile = serde_json::from_str(content).map_err(|e| parse_error(source, e))?;

    let defect_band = match file.defect_band {
        Some(entries) => {
            let indices = entries
                .iter()
                .map(|&[band, kpoint, spin]| Ok(BandIndex::new(band, kpoint, Spin::from_index(spin)?)))
                .collect::<Result<Vec<_>>>()?;
            Some(DefectBand::new(indices)?)
        }
        None => None,
    };

    let steps = file
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, record)| convert_step(i, record).map_err(|e| parse_error(source, e)))
        .collect::<Result<Vec<_>>>()?;

    if steps.is_empty() {
        return Err(parse_error(source, "no distortion steps"));
    }

    Ok(DefectInput {
        name: file.name.unwrap_or_else(|| default_name.to_string()),
        charge_state: file.charge_state,
        relaxed_index: file.relaxed_index,
        defect_band,
        steps,
    })
}

fn convert_step(index: usize, record: StepRecord) -> Result<StepCalculation> {
    let name = record.name.unwrap_or_else(|| format!("step{}", index));
    let mut step = StepCalculation::new(name, record.energy);
    if let Some(q) = record.distortion {
        step = step.with_distortion(q);
    }
    if let Some(s) = record.structure {
        let atoms = s
            .atoms
            .into_iter()
            .map(|a| Atom::new(a.element, a.position))
            .collect();
        step = step.with_structure(Crystal::new(Lattice::from_vectors(s.lattice), atoms));
    }
    if let Some(e) = record.electronic {
        step = step.with_electronic(convert_electronic(e)?);
    }
    Ok(step)
}

fn convert_electronic(record: ElectronicRecord) -> Result<ElectronicData> {
    let eigenvalues = nested3(&record.eigenvalues, "eigenvalues")?;
    let shape = eigenvalues.dim();
    let mut data = ElectronicData::new(record.efermi, eigenvalues);

    if let Some(occ) = &record.occupations {
        data = data.with_occupations(nested3(occ, "occupations")?)?;
    }
    if let Some(w) = record.kweights {
        data = data.with_kweights(Array1::from(w))?;
    }

    match (&record.ipr, &record.projections) {
        (Some(ipr), _) => {
            data = data.with_localization(nested3(ipr, "ipr")?)?;
        }
        (None, Some(proj)) => {
            data = data.with_localization(projection_scores(proj, shape)?)?;
        }
        (None, None) => {}
    }

    Ok(data)
}

/// 投影 → 参与数（直接使用原始投影权重）
fn projection_scores(
    proj: &[Vec<Vec<Vec<f64>>>],
    shape: (usize, usize, usize),
) -> Result<Array3<f64>> {
    let (ns, nk, nb) = shape;
    let mut scores = Array3::<f64>::zeros(shape);
    for s in 0..ns {
        for k in 0..nk {
            for b in 0..nb {
                let p = proj
                    .get(s)
                    .and_then(|x| x.get(k))
                    .and_then(|x| x.get(b))
                    .ok_or_else(|| {
                        DefectError::InvalidData(format!(
                            "projections missing for spin {}, k-point {}, band {}",
                            s, k, b
                        ))
                    })?;
                scores[[s, k, b]] = participation_number(p);
            }
        }
    }
    Ok(scores)
}

fn nested3(v: &[Vec<Vec<f64>>], what: &str) -> Result<Array3<f64>> {
    let ns = v.len();
    let nk = v.first().map(|x| x.len()).unwrap_or(0);
    let nb = v
        .first()
        .and_then(|x| x.first())
        .map(|x| x.len())
        .unwrap_or(0);
    if ns == 0 || nk == 0 || nb == 0 {
        return Err(DefectError::InvalidData(format!("{} array is empty", what)));
    }

    let mut flat = Vec::with_capacity(ns * nk * nb);
    for (s, per_spin) in v.iter().enumerate() {
        if per_spin.len() != nk {
            return Err(DefectError::InvalidData(format!(
                "{}: spin {} has {} k-points, expected {}",
                what,
                s,
                per_spin.len(),
                nk
            )));
        }
        for (k, per_k) in per_spin.iter().enumerate() {
            if per_k.len() != nb {
                return Err(DefectError::InvalidData(format!(
                    "{}: spin {}, k-point {} has {} bands, expected {}",
                    what,
                    s,
                    k,
                    per_k.len(),
                    nb
                )));
            }
            flat.extend_from_slice(per_k);
        }
    }
    Array3::from_shape_vec((ns, nk, nb), flat).map_err(|e| DefectError::InvalidData(e.to_string()))
}

// ─────────────────────────────────────────────────────────────
// 交叠文件
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OverlapFile {
    entries: Vec<OverlapRecord>,
}

#[derive(Debug, Deserialize)]
struct OverlapRecord {
    step: usize,
    #[serde(default)]
    spin: usize,
    #[serde(default)]
    kpoint: usize,
    real: Vec<Vec<f64>>,
    imag: Option<Vec<Vec<f64>>>,
}

/// 解析交叠文件
pub fn parse_overlap_file(path: &Path) -> Result<OverlapSet> {
    let content = read_text(path)?;
    parse_overlap_content(&content, &path.display().to_string())
}

/// 从字符串内容解析交叠文件
pub fn parse_overlap_content(content: &str, source: &str) -> Result<OverlapSet> {
    let file: OverlapFile = serde_json::from_str(content).map_err(|e| parse_error(source, e))?;

    let mut set = OverlapSet::new();
    for record in file.entries {
        if record.real.is_empty() {
            log::warn!(
                "Ignoring empty overlap entry for step {}, spin {}, k-point {} in {}",
                record.step,
                record.spin,
                record.kpoint,
                source
            );
            continue;
        }
        let matrix = complex_matrix(&record.real, record.imag.as_deref())
            .map_err(|e| parse_error(source, e))?;
        let spin = Spin::from_index(record.spin)?;
        set.insert(record.step, spin, record.kpoint, matrix)?;
    }

    if set.is_empty() {
        return Err(parse_error(source, "no overlap matrices"));
    }
    Ok(set)
}

fn complex_matrix(real: &[Vec<f64>], imag: Option<&[Vec<f64>]>) -> Result<Array2<Complex64>> {
    let nrow = real.len();
    let ncol = real.first().map(|r| r.len()).unwrap_or(0);
    if real.iter().any(|r| r.len() != ncol) {
        return Err(DefectError::InvalidData("ragged overlap matrix".to_string()));
    }
    if let Some(im) = imag {
        if im.len() != nrow || im.iter().any(|r| r.len() != ncol) {
            return Err(DefectError::InvalidData(
                "real and imaginary overlap parts differ in shape".to_string(),
            ));
        }
    }
    Ok(Array2::from_shape_fn((nrow, ncol), |(i, j)| {
        let im = imag.map(|m| m[i][j]).unwrap_or(0.0);
        Complex64::new(real[i][j], im)
    }))
}

// ─────────────────────────────────────────────────────────────
// 偶极文件
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DipoleFile {
    nbands: usize,
    nkpoints: usize,
    nspins: usize,
    elements: Vec<DipoleRecord>,
}

#[derive(Debug, Deserialize)]
struct DipoleRecord {
    band_i: usize,
    band_j: usize,
    #[serde(default)]
    kpoint: usize,
    #[serde(default)]
    spin: usize,
    x: [f64; 2],
    y: [f64; 2],
    z: [f64; 2],
}

/// 解析偶极文件
pub fn parse_dipole_file(path: &Path) -> Result<DipoleSet> {
    let content = read_text(path)?;
    parse_dipole_content(&content, &path.display().to_string())
}

/// 从字符串内容解析偶极文件
pub fn parse_dipole_content(content: &str, source: &str) -> Result<DipoleSet> {
    let file: DipoleFile = serde_json::from_str(content).map_err(|e| parse_error(source, e))?;
    if file.nbands == 0 || file.nkpoints == 0 || file.nspins == 0 {
        return Err(parse_error(source, "dipole dimensions must be positive"));
    }

    let mut dipoles = DipoleSet::zeros(file.nbands, file.nkpoints, file.nspins);
    let c = |v: [f64; 2]| Complex64::new(v[0], v[1]);
    for e in file.elements {
        dipoles.set(e.band_i, e.band_j, e.kpoint, e.spin, [c(e.x), c(e.y), c(e.z)])?;
    }
    Ok(dipoles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    const DEFECT_JSON: &str = r#"{
        "name": "C_N",
        "charge_state": -1,
        "steps": [
            { "energy": 0.1, "distortion": -0.1 },
            { "name": "relaxed", "energy": 0.0, "distortion": 0.0,
              "electronic": {
                "efermi": 0.0,
                "eigenvalues": [[[-1.0, 0.5, 1.5]]],
                "projections": [[[[0.25, 0.25, 0.25, 0.25], [1.0, 0.0, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0]]]]
              } },
            { "energy": 0.1, "distortion": 0.1 }
        ]
    }"#;

    #[test]
    fn test_parse_defect_content() {
        let input = parse_defect_content(DEFECT_JSON, "test.json", "fallback").unwrap();
        assert_eq!(input.name, "C_N");
        assert_eq!(input.charge_state, Some(-1));
        assert_eq!(input.steps.len(), 3);
        assert_eq!(input.steps[0].name, "step0");
        assert!(input.defect_band.is_none());

        let data = input.steps[1].electronic.as_ref().unwrap();
        let scores = data.localization.as_ref().unwrap();
        assert!((scores[[0, 0, 0]] - 4.0).abs() < 1e-12);
        assert!((scores[[0, 0, 1]] - 1.0).abs() < 1e-12);
        assert!((scores[[0, 0, 2]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_defect_input_detects_band() {
        let input = parse_defect_content(DEFECT_JSON, "test.json", "fallback").unwrap();
        let defect = input
            .into_builder(LocatorOptions::default())
            .build()
            .unwrap();
        assert_eq!(defect.relaxed_index(), 1);
        assert_eq!(defect.defect_band().entries()[0].band, 1);
        assert_eq!(defect.charge_state(), Some(-1));
    }

    #[test]
    fn test_weakly_projected_band_is_not_localized() {
        let json = r#"{ "steps": [
            { "energy": 0.1, "distortion": -0.1 },
            { "energy": 0.0, "distortion": 0.0, "electronic": {
                "efermi": 0.0,
                "eigenvalues": [[[-0.1, 0.1]]],
                "projections": [[[[0.1, 0.0, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0]]]]
            } },
            { "energy": 0.1, "distortion": 0.1 }
        ] }"#;
        let input = parse_defect_content(json, "test.json", "x").unwrap();
        let scores = input.steps[1]
            .electronic
            .as_ref()
            .unwrap()
            .localization
            .clone()
            .unwrap();
        assert!((scores[[0, 0, 0]] - 100.0).abs() < 1e-9);
        assert!((scores[[0, 0, 1]] - 2.0).abs() < 1e-12);

        let defect = input
            .into_builder(LocatorOptions::default())
            .build()
            .unwrap();
        assert_eq!(defect.defect_band().entries()[0].band, 1);
    }

    #[test]
    fn test_explicit_defect_band() {
        let json = r#"{ "defect_band": [[4, 0, 1]], "steps": [{ "energy": 1.0 }] }"#;
        let input = parse_defect_content(json, "test.json", "fallback").unwrap();
        assert_eq!(input.name, "fallback");
        let band = input.defect_band.unwrap();
        assert_eq!(band.entries(), &[BandIndex::new(4, 0, Spin::Down)]);
    }

    #[test]
    fn test_ragged_eigenvalues_rejected() {
        let json = r#"{ "steps": [{ "energy": 0.0, "electronic": {
            "efermi": 0.0, "eigenvalues": [[[0.0, 1.0], [0.0]]] } }] }"#;
        assert!(matches!(
            parse_defect_content(json, "bad.json", "x"),
            Err(DefectError::ParseError { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_defect_content("{ not json", "bad.json", "x"),
            Err(DefectError::ParseError { .. })
        ));
    }

    #[test]
    fn test_parse_overlap_content() {
        let json = r#"{ "entries": [
            { "step": 0, "spin": 0, "kpoint": 0, "real": [[1.0, 0.1], [0.0, 1.0]], "imag": [[0.0, 0.2], [0.0, 0.0]] },
            { "step": 2, "real": [[1.0, -0.1], [0.0, 1.0]] },
            { "step": 3, "real": [] }
        ] }"#;
        let set = parse_overlap_content(json, "wswq.json").unwrap();
        assert_eq!(set.steps(), vec![0, 2]);
        assert_eq!(set.nbands(), Some(2));
        let m = set.matrix(0, 0, Spin::Up).unwrap();
        assert_eq!(m[[0, 1]], Complex64::new(0.1, 0.2));
    }

    #[test]
    fn test_overlap_shape_mismatch() {
        let json = r#"{ "entries": [
            { "step": 0, "real": [[1.0, 0.0], [0.0, 1.0]], "imag": [[0.0]] }
        ] }"#;
        assert!(parse_overlap_content(json, "wswq.json").is_err());
    }

    #[test]
    fn test_parse_dipole_content() {
        let json = r#"{ "nbands": 3, "nkpoints": 1, "nspins": 1, "elements": [
            { "band_i": 0, "band_j": 2, "x": [0.5, 0.0], "y": [0.0, 0.0], "z": [0.0, -0.3] }
        ] }"#;
        let dipoles = parse_dipole_content(json, "waveder.json").unwrap();
        assert_eq!(dipoles.shape(), (3, 1, 1));
        assert_eq!(dipoles.get(0, 2, 0, 0, Direction::X), Complex64::new(0.5, 0.0));
        assert_eq!(dipoles.get(0, 2, 0, 0, Direction::Z), Complex64::new(0.0, -0.3));
    }

    #[test]
    fn test_dipole_out_of_range() {
        let json = r#"{ "nbands": 2, "nkpoints": 1, "nspins": 1, "elements": [
            { "band_i": 0, "band_j": 5, "x": [1.0, 0.0], "y": [0.0, 0.0], "z": [0.0, 0.0] }
        ] }"#;
        assert!(parse_dipole_content(json, "waveder.json").is_err());
    }
}
