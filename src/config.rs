//! # SRH 作业配置
//!
//! 单个 SRH 俘获计算的 TOML 描述。
//!
//! ## 示例
//! ```toml
//! name = "C_N capture"
//! initial = "C_N_0.json"
//! final = "C_N_-1.json"
//! overlaps = "wswq_0.json"
//! temperatures = { start = 100.0, stop = 500.0, step = 50.0 }
//! energy_offset = 0.3
//! band_edge = "conduction"
//! dq = "pes-minima"        # 或 "structures"，或数值 (amu^1/2 Å)
//!
//! [defect_state]
//! band = 191
//! kpoint = 0
//! spin = 0
//! ```
//! 相对路径以作业文件所在目录为基准。
//!
//! ## 依赖关系
//! - 被 `commands/srh.rs` 和 `batch/runner.rs` 使用
//! - 使用 `defect/srh.rs` 的参数类型
//! - 使用 `serde` + `toml` 反序列化

use crate::defect::{BandEdge, DqSource, PhaseConvention, SrhOptions};
use crate::error::{DefectError, Result};
use crate::models::{BandIndex, Spin};
use crate::parsers::read_text;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 温度列表或等间距范围 (K)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemperatureSpec {
    List(Vec<f64>),
    Range { start: f64, stop: f64, step: f64 },
}

impl TemperatureSpec {
    /// 展开为温度数组（范围包含端点）
    pub fn values(&self) -> Vec<f64> {
        match self {
            TemperatureSpec::List(list) => list.clone(),
            TemperatureSpec::Range { start, stop, step } => {
                let n = ((stop - start) / step + 1e-9).floor() as usize + 1;
                (0..n).map(|i| start + i as f64 * step).collect()
            }
        }
    }
}

/// ΔQ 的来源名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DqMode {
    PesMinima,
    Structures,
}

/// ΔQ 设置：来源名称或显式数值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DqSpec {
    Value(f64),
    Mode(DqMode),
}

impl From<DqSpec> for DqSource {
    fn from(spec: DqSpec) -> Self {
        match spec {
            DqSpec::Value(v) => DqSource::Explicit(v),
            DqSpec::Mode(DqMode::PesMinima) => DqSource::PesMinima,
            DqSpec::Mode(DqMode::Structures) => DqSource::Structures,
        }
    }
}

/// 显式指定的缺陷态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpec {
    pub band: usize,
    #[serde(default)]
    pub kpoint: usize,
    #[serde(default)]
    pub spin: usize,
}

fn default_degeneracy() -> f64 {
    1.0
}

fn default_n_band_edge() -> usize {
    1
}

fn default_occ_tol() -> f64 {
    1e-5
}

/// SRH 作业
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SrhJob {
    /// 作业名称（默认取文件名）
    pub name: Option<String>,
    /// 初态缺陷文件
    pub initial: PathBuf,
    /// 末态缺陷文件
    #[serde(rename = "final")]
    pub final_: PathBuf,
    /// 交叠文件（附加到初态，`use_final_state_elph` 时附加到末态）
    pub overlaps: PathBuf,
    pub temperatures: TemperatureSpec,
    /// 零声子线能量 ΔE (eV)
    pub energy_offset: f64,
    #[serde(default = "default_degeneracy")]
    pub degeneracy: f64,
    #[serde(default)]
    pub band_edge: BandEdge,
    #[serde(default = "default_n_band_edge")]
    pub n_band_edge: usize,
    #[serde(default = "default_occ_tol")]
    pub occ_tol: f64,
    pub sigma: Option<f64>,
    pub dq: Option<DqSpec>,
    pub volume: Option<f64>,
    #[serde(default)]
    pub use_final_state_elph: bool,
    #[serde(default)]
    pub phase: PhaseConvention,
    pub defect_state: Option<StateSpec>,
    /// 输出 CSV（默认 `<作业文件名>_srh.csv`）
    pub output: Option<PathBuf>,

    #[serde(skip)]
    source: PathBuf,
}

impl SrhJob {
    /// 从 TOML 文件加载并校验
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = read_text(path)?;
        let mut job = Self::from_toml(&content, &path.display().to_string())?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        job.resolve_paths(base);
        job.source = path.to_path_buf();
        Ok(job)
    }

    /// 从 TOML 字符串解析并校验（路径不做解析）
    pub fn from_toml(content: &str, source: &str) -> Result<Self> {
        let job: SrhJob = toml::from_str(content).map_err(|e| DefectError::ParseError {
            format: "TOML".to_string(),
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        job.validate()?;
        Ok(job)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.initial);
        resolve(&mut self.final_);
        resolve(&mut self.overlaps);
        if let Some(out) = self.output.as_mut() {
            resolve(out);
        }
    }

    /// 校验数值参数
    pub fn validate(&self) -> Result<()> {
        if let TemperatureSpec::Range { start, stop, step } = self.temperatures {
            if !(step > 0.0) {
                return Err(DefectError::InvalidArgument(format!(
                    "temperature step must be positive (got {})",
                    step
                )));
            }
            if stop < start {
                return Err(DefectError::InvalidArgument(format!(
                    "temperature range is empty ({} > {})",
                    start, stop
                )));
            }
        }
        let temps = self.temperatures.values();
        if temps.is_empty() {
            return Err(DefectError::InvalidArgument("no temperatures given".to_string()));
        }
        if let Some(t) = temps.iter().find(|t| **t < 0.0) {
            return Err(DefectError::InvalidArgument(format!(
                "temperatures must be non-negative (got {})",
                t
            )));
        }
        if self.energy_offset < 0.0 {
            return Err(DefectError::InvalidArgument(format!(
                "energy_offset must be non-negative (got {})",
                self.energy_offset
            )));
        }
        if !(self.degeneracy > 0.0) {
            return Err(DefectError::InvalidArgument(format!(
                "degeneracy must be positive (got {})",
                self.degeneracy
            )));
        }
        if self.n_band_edge == 0 {
            return Err(DefectError::InvalidArgument(
                "n_band_edge must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 作业名称
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("srh")
                .to_string()
        })
    }

    pub fn temperature_values(&self) -> Vec<f64> {
        self.temperatures.values()
    }

    /// 转换为计算参数
    pub fn options(&self) -> SrhOptions {
        SrhOptions {
            degeneracy: self.degeneracy,
            occ_tol: self.occ_tol,
            sigma: self.sigma,
            band_edge: self.band_edge,
            n_band_edge: self.n_band_edge,
            use_final_state_elph: self.use_final_state_elph,
            dq: self.dq.map(DqSource::from).unwrap_or_default(),
            volume: self.volume,
            phase: self.phase,
        }
    }

    /// 显式缺陷态
    pub fn defect_state(&self) -> Result<Option<BandIndex>> {
        match self.defect_state {
            Some(s) => Ok(Some(BandIndex::new(s.band, s.kpoint, Spin::from_index(s.spin)?))),
            None => Ok(None),
        }
    }

    /// 输出文件路径
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(p) => p.clone(),
            None => {
                let stem = self
                    .source
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("srh");
                self.source.with_file_name(format!("{}_srh.csv", stem))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
        initial = "a.json"
        final = "b.json"
        overlaps = "wswq.json"
        temperatures = { start = 100.0, stop = 300.0, step = 50.0 }
        energy_offset = 0.3
        dq = 1.25
        band_edge = "valence"

        [defect_state]
        band = 10
        spin = 1
    "#;

    #[test]
    fn test_parse_job() {
        let job = SrhJob::from_toml(JOB, "job.toml").unwrap();
        assert_eq!(job.temperature_values(), vec![100.0, 150.0, 200.0, 250.0, 300.0]);
        assert_eq!(job.degeneracy, 1.0);
        assert_eq!(job.occ_tol, 1e-5);

        let opts = job.options();
        assert_eq!(opts.dq, DqSource::Explicit(1.25));
        assert_eq!(opts.band_edge, BandEdge::Valence);
        assert_eq!(opts.n_band_edge, 1);
        assert!(!opts.use_final_state_elph);

        let state = job.defect_state().unwrap().unwrap();
        assert_eq!(state, BandIndex::new(10, 0, Spin::Down));
    }

    #[test]
    fn test_dq_mode_and_list() {
        let toml = r#"
            initial = "a.json"
            final = "b.json"
            overlaps = "wswq.json"
            temperatures = [0.0, 300.0]
            energy_offset = 1.0
            dq = "structures"
        "#;
        let job = SrhJob::from_toml(toml, "job.toml").unwrap();
        assert_eq!(job.temperature_values(), vec![0.0, 300.0]);
        assert_eq!(job.options().dq, DqSource::Structures);
        assert!(job.defect_state().unwrap().is_none());
    }

    #[test]
    fn test_negative_temperature_rejected() {
        let toml = r#"
            initial = "a.json"
            final = "b.json"
            overlaps = "wswq.json"
            temperatures = [-10.0, 300.0]
            energy_offset = 1.0
        "#;
        assert!(matches!(
            SrhJob::from_toml(toml, "job.toml"),
            Err(DefectError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_step_rejected() {
        let toml = r#"
            initial = "a.json"
            final = "b.json"
            overlaps = "wswq.json"
            temperatures = { start = 100.0, stop = 300.0, step = 0.0 }
            energy_offset = 1.0
        "#;
        assert!(SrhJob::from_toml(toml, "job.toml").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            initial = "a.json"
            final = "b.json"
            overlaps = "wswq.json"
            temperatures = [300.0]
            energy_offset = 1.0
            temprature = 5
        "#;
        assert!(matches!(
            SrhJob::from_toml(toml, "job.toml"),
            Err(DefectError::ParseError { .. })
        ));
    }

    #[test]
    fn test_relative_paths_resolve_against_job_dir() {
        let mut job = SrhJob::from_toml(JOB, "job.toml").unwrap();
        job.resolve_paths(Path::new("/data/run1"));
        job.source = PathBuf::from("/data/run1/capture.toml");
        assert_eq!(job.initial, PathBuf::from("/data/run1/a.json"));
        assert_eq!(job.output_path(), PathBuf::from("/data/run1/capture_srh.csv"));
        assert_eq!(job.display_name(), "capture");
    }
}
