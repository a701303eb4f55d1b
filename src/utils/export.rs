//! # CSV 导出
//!
//! 各子命令的结果表统一经由这里写出。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `batch/runner.rs` 调用
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{DefectError, Result};
use std::path::Path;

/// 写出带表头的 CSV 文件
pub fn write_csv<I>(output_path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DefectError::FileWriteError {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.flush().map_err(|e| DefectError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv_creates_parent() {
        let dir = std::env::temp_dir().join(format!("qudefect-export-{}", std::process::id()));
        let path = dir.join("nested").join("out.csv");
        write_csv(
            &path,
            &["T_K", "C_cm3_s"],
            vec![vec!["300".to_string(), "1.0e-10".to_string()]],
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "T_K,C_cm3_s\n300,1.0e-10\n");
        std::fs::remove_dir_all(&dir).ok();
    }
}
