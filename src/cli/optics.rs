//! # optics 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/optics.rs`

use super::locate::LocatorArgs;
use crate::defect::{FermiLevel, OpticsOptions};
use crate::models::Direction;

use clap::Args;
use std::path::PathBuf;

/// optics 子命令参数
#[derive(Args, Debug)]
pub struct OpticsArgs {
    /// Defect JSON file
    pub input: PathBuf,

    /// Dipole JSON file
    #[arg(long)]
    pub dipoles: PathBuf,

    /// First Cartesian direction
    #[arg(long, value_enum, default_value_t = Direction::X)]
    pub idir: Direction,

    /// Second Cartesian direction
    #[arg(long, value_enum, default_value_t = Direction::X)]
    pub jdir: Direction,

    /// Number of energy grid points
    #[arg(long, default_value_t = 2000)]
    pub nedos: usize,

    /// Energy grid spacing (eV)
    #[arg(long, default_value_t = 0.005)]
    pub deltae: f64,

    /// Fermi-Dirac and Gaussian smearing (eV)
    #[arg(long, default_value_t = 0.1)]
    pub sigma: f64,

    /// Complex shift of the Kramers-Kronig transform (eV)
    #[arg(long, default_value_t = 0.1)]
    pub cshift: f64,

    /// Cell volume in A^3 (default: relaxed structure)
    #[arg(long)]
    pub volume: Option<f64>,

    /// Explicit Fermi level in eV (default: occupations from the input, else its Fermi level)
    #[arg(long, conflicts_with_all = ["force_occupied", "force_empty"])]
    pub fermi_level: Option<f64>,

    /// Place the Fermi level above the defect state
    #[arg(long, conflicts_with = "force_empty")]
    pub force_occupied: bool,

    /// Place the Fermi level below the defect state
    #[arg(long)]
    pub force_empty: bool,

    /// CSV file for the spectrum
    #[arg(short, long, default_value = "dielectric.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub locator: LocatorArgs,
}

impl OpticsArgs {
    pub fn options(&self) -> OpticsOptions {
        let fermi = match (self.fermi_level, self.force_occupied, self.force_empty) {
            (Some(e), _, _) => FermiLevel::Explicit(e),
            (None, true, _) => FermiLevel::DefectOccupied,
            (None, false, true) => FermiLevel::DefectEmpty,
            (None, false, false) => FermiLevel::Natural,
        };
        OpticsOptions {
            nedos: self.nedos,
            deltae: self.deltae,
            sigma: self.sigma,
            cshift: self.cshift,
            fermi,
            volume: self.volume,
        }
    }
}
