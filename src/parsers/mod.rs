//! # 解析器模块
//!
//! 读取外部工具导出的中间格式（JSON），构造数据模型。
//! 原生模拟软件输出（OUTCAR、PROCAR、WAVECAR 等）的解析由外部工具完成。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `batch/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: json

pub mod json;

use crate::error::{DefectError, Result};
use std::fs;
use std::path::Path;

pub use json::{parse_defect_file, parse_dipole_file, parse_overlap_file};

/// 读取文本文件，区分文件不存在与读取失败
pub fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(DefectError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| DefectError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}
