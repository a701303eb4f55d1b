//! # locate 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/locate.rs`

use crate::defect::{LocatorOptions, TieBreak};

use clap::Args;
use std::path::PathBuf;

/// 缺陷能带检测参数（多个子命令共用）
#[derive(Args, Debug, Clone)]
pub struct LocatorArgs {
    /// Number of bands searched on each side of the Fermi level
    #[arg(long, default_value_t = 7)]
    pub window: usize,

    /// Policy for equally localized bands at one k-point
    #[arg(long, value_enum, default_value_t = TieBreak::ClosestToFermi)]
    pub tie_break: TieBreak,
}

impl LocatorArgs {
    pub fn options(&self) -> LocatorOptions {
        LocatorOptions {
            band_window: self.window,
            tie_break: self.tie_break,
            ..LocatorOptions::default()
        }
    }
}

/// locate 子命令参数
#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Defect JSON file
    pub input: PathBuf,

    #[command(flatten)]
    pub locator: LocatorArgs,
}
