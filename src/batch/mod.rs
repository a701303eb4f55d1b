//! # 批量处理模块
//!
//! 目录模式下的 SRH 作业批处理。
//!
//! ## 功能
//! - 收集目录中的作业文件
//! - 并行执行
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/srh.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::JobCollector;
pub use runner::{BatchRunner, JobOutcome};
