//! # srh 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/srh.rs`

use clap::Args;
use std::path::PathBuf;

/// srh 子命令参数
#[derive(Args, Debug)]
pub struct SrhArgs {
    /// Input: SRH job TOML file or directory of job files
    pub input: PathBuf,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// File name pattern for job files (directory mode, e.g., "*.toml,srh_*")
    #[arg(long, default_value = "*.toml")]
    pub pattern: String,

    /// Recurse into subdirectories (directory mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto, directory mode only)
    #[arg(short, long, default_value_t = 0, env = "QUDEFECT_JOBS")]
    pub jobs: usize,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
