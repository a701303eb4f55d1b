//! # 日志初始化
//!
//! 数值核心通过 `log` 门面输出诊断信息，这里配置 `env_logger` 后端。
//!
//! 默认级别为 warn；每个 `-v` 提升一级（info → debug → trace），
//! `-q` 只保留错误。设置了 `RUST_LOG` 时以环境变量为准。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `log` + `env_logger`

use log::LevelFilter;

/// 由命令行的 `-v`/`-q` 计算日志级别
pub fn level_from_flags(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// 初始化全局日志
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_from_flags(verbose, quiet))
        .format_timestamp(None)
        .format_target(false);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    // 重复初始化（例如测试中）时忽略
    let _ = builder.try_init();
}
