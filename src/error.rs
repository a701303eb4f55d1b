//! # 统一错误处理模块
//!
//! 定义 qudefect 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 缺陷能带识别不明确：不是错误，只通过 `log::warn!` 报告
//! - 谐振拟合非物理（曲率非正）：`UnphysicalPes`
//! - 有限差分位移样本不足：`InsufficientDisplacements`
//! - SRH 初末态形状不匹配：`DefectBandMismatch`
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// qudefect 统一错误类型
#[derive(Error, Debug)]
pub enum DefectError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Inconsistent input data: {0}")]
    InvalidData(String),

    // ─────────────────────────────────────────────────────────────
    // 缺陷能带 / 势能面
    // ─────────────────────────────────────────────────────────────
    #[error("Duplicate defect band entry for k-point {kpoint}, spin {spin}")]
    DuplicateBandEntry { kpoint: usize, spin: usize },

    #[error("Cannot locate defect band: {0}")]
    DetectionFailed(String),

    #[error("Unphysical PES: fitted curvature {curvature:.6e} eV/(amu Å²) is not positive")]
    UnphysicalPes { curvature: f64 },

    #[error("Harmonic fit needs at least 3 distinct distortions, got {found}")]
    TooFewSamples { found: usize },

    // ─────────────────────────────────────────────────────────────
    // 电声耦合
    // ─────────────────────────────────────────────────────────────
    #[error("Finite difference needs at least 2 distinct non-zero displacements, got {found}")]
    InsufficientDisplacements { found: usize },

    #[error("No overlap matrix for k-point {kpoint}, spin {spin} at step {step}")]
    MissingOverlap {
        step: usize,
        kpoint: usize,
        spin: usize,
    },

    // ─────────────────────────────────────────────────────────────
    // SRH 俘获
    // ─────────────────────────────────────────────────────────────
    #[error("Defect band mismatch: initial state has {initial} k-points, final state has {final_} k-points")]
    DefectBandMismatch { initial: usize, final_: usize },

    #[error("{operation} requires stage '{required}', defect is at '{current}'")]
    StageRequired {
        operation: String,
        required: String,
        current: String,
    },

    #[error("Missing input: {0}")]
    MissingInput(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, DefectError>;
