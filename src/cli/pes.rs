//! # pes 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/pes.rs`

use super::locate::LocatorArgs;
use clap::Args;
use std::path::PathBuf;

/// pes 子命令参数
#[derive(Args, Debug)]
pub struct PesArgs {
    /// Defect JSON file
    pub input: PathBuf,

    /// CSV file for the (Q, E, E_fit) samples
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub locator: LocatorArgs,
}
