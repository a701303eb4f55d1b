//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `locate`: 缺陷能带定位
//! - `pes`: 谐振势能面拟合
//! - `elph`: 电声耦合矩阵元
//! - `optics`: 缺陷相关介电函数
//! - `srh`: SRH 俘获系数（单个作业或作业目录）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: locate, pes, elph, optics, srh

pub mod elph;
pub mod locate;
pub mod optics;
pub mod pes;
pub mod srh;

use clap::{Parser, Subcommand};

/// qudefect - 点缺陷物理后处理工具
#[derive(Parser)]
#[command(name = "qudefect")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Point-defect physics from configuration-coordinate DFT data", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Locate the localized defect band across k-points and spins
    Locate(locate::LocateArgs),

    /// Fit the harmonic potential-energy surface of the distortion coordinate
    Pes(pes::PesArgs),

    /// Compute electron-phonon matrix elements from wavefunction overlaps
    Elph(elph::ElphArgs),

    /// Compute the defect-related dielectric function
    Optics(optics::OpticsArgs),

    /// Compute SRH capture coefficients from a job file or a directory of jobs
    Srh(srh::SrhArgs),
}
