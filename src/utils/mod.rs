//! # 工具函数模块
//!
//! 提供美化输出、进度条、日志初始化等工具。
//!
//! ## 依赖关系
//! - 被 `main.rs`、`commands/` 和 `batch/` 模块使用
//! - 子模块: output, progress, logging, export

pub mod export;
pub mod logging;
pub mod output;
pub mod progress;
