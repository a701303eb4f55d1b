//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑：读取输入、调用数值核心、输出表格和 CSV。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `defect/`, `utils/`
//! - 子模块: locate, pes, elph, optics, srh

pub mod elph;
pub mod locate;
pub mod optics;
pub mod pes;
pub mod srh;

use crate::cli::Commands;
use crate::defect::{HarmonicDefect, LocatorOptions};
use crate::error::Result;
use crate::parsers;

use std::path::Path;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Locate(args) => locate::execute(args),
        Commands::Pes(args) => pes::execute(args),
        Commands::Elph(args) => elph::execute(args),
        Commands::Optics(args) => optics::execute(args),
        Commands::Srh(args) => srh::execute(args),
    }
}

/// 读取缺陷文件并构建到 PesFitted 阶段
pub fn load_defect(path: &Path, locator: LocatorOptions) -> Result<HarmonicDefect> {
    let input = parsers::parse_defect_file(path)?;
    log::info!(
        "Loaded '{}' ({} steps) from {}",
        input.name,
        input.steps.len(),
        path.display()
    );
    input.into_builder(locator).build()
}

/// 科学计数法格式化
pub(crate) fn sci(value: f64) -> String {
    format!("{:.4e}", value)
}
