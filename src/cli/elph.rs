//! # elph 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/elph.rs`

use super::locate::LocatorArgs;
use crate::defect::PhaseConvention;

use clap::Args;
use std::path::PathBuf;

/// elph 子命令参数
#[derive(Args, Debug)]
pub struct ElphArgs {
    /// Defect JSON file
    pub input: PathBuf,

    /// Overlap JSON file
    #[arg(long)]
    pub overlaps: PathBuf,

    /// Defect band index (default: detected or explicit defect band)
    #[arg(long)]
    pub band: Option<usize>,

    /// K-point index of the defect state
    #[arg(long, default_value_t = 0)]
    pub kpoint: usize,

    /// Spin index of the defect state (0 = up, 1 = down)
    #[arg(long)]
    pub spin: Option<usize>,

    /// Phase convention applied to the overlaps
    #[arg(long, value_enum, default_value_t = PhaseConvention::MagnitudeSign)]
    pub phase: PhaseConvention,

    /// CSV file for the matrix elements
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub locator: LocatorArgs,
}
