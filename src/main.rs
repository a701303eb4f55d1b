//! # qudefect - 点缺陷一阶原理后处理工具箱
//!
//! 以畸变坐标序列上的一系列计算为输入，完成缺陷能带定位、位形坐标势能面拟合、
//! 电声耦合、缺陷相关介电函数和 SRH 非辐射俘获系数计算。
//!
//! ## 子命令
//! - `locate` - 定位缺陷能带
//! - `pes`    - 拟合谐振势能面
//! - `elph`   - 计算电声耦合矩阵元
//! - `optics` - 计算缺陷相关介电函数
//! - `srh`    - 计算 SRH 俘获系数（单个作业或目录批处理）
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (JSON 输入解析)
//!   │     ├── config.rs  (SRH 作业 TOML)
//!   │     ├── batch/     (批处理)
//!   │     ├── defect/    (数值核心)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (输出、日志、进度条)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod config;
mod defect;
mod error;
mod models;
mod parsers;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logging::init_logging(cli.verbose, cli.quiet);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
