//! # 作业文件收集器
//!
//! 根据输入路径和文件名模式收集 SRH 作业文件。
//!
//! ## 功能
//! - 单个作业文件直接返回
//! - 目录输入按模式匹配（默认 `*.toml`），可递归
//! - 结果按路径排序，批量运行顺序稳定
//!
//! ## 依赖关系
//! - 被 `commands/srh.rs` 调用
//! - 使用 `walkdir` 遍历目录

use crate::error::{DefectError, Result};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 作业文件收集器
pub struct JobCollector {
    input: PathBuf,
    /// 文件名模式（逗号分隔的多模式）
    patterns: Vec<String>,
    recursive: bool,
}

impl JobCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: vec!["*.toml".to_string()],
            recursive: false,
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        let patterns: Vec<String> = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !patterns.is_empty() {
            self.patterns = patterns;
        }
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 输入是否为单个作业文件
    pub fn is_single_file(&self) -> bool {
        self.input.is_file()
    }

    /// 收集所有匹配的作业文件
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }
        if !self.input.is_dir() {
            return Err(DefectError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches_patterns(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        Ok(files)
    }

    fn matches_patterns(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.patterns.iter().any(|p| glob_match(p, name)),
            None => false,
        }
    }
}

/// 简单 glob 匹配（支持 * 和 ? 通配符）
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();

    let mut p = 0;
    let mut t = 0;
    let mut star_p = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }

    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.toml", "capture.toml"));
        assert!(!glob_match("*.toml", "capture.json"));
        assert!(glob_match("srh_*", "srh_C_N.toml"));
        assert!(glob_match("job?.toml", "job1.toml"));
        assert!(!glob_match("job?.toml", "job12.toml"));
    }

    #[test]
    fn test_collect_directory() {
        let root = std::env::temp_dir().join(format!("qudefect-collect-{}", std::process::id()));
        let nested = root.join("sub");
        fs::create_dir_all(&nested).unwrap();
        for name in ["b.toml", "a.toml", "notes.txt"] {
            fs::write(root.join(name), "").unwrap();
        }
        fs::write(nested.join("c.toml"), "").unwrap();

        let flat = JobCollector::new(root.clone()).collect().unwrap();
        assert_eq!(flat, vec![root.join("a.toml"), root.join("b.toml")]);

        let deep = JobCollector::new(root.clone()).recursive(true).collect().unwrap();
        assert_eq!(deep.len(), 3);

        let custom = JobCollector::new(root.clone())
            .with_pattern("*.txt")
            .collect()
            .unwrap();
        assert_eq!(custom, vec![root.join("notes.txt")]);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_missing_input() {
        let missing = PathBuf::from("/nonexistent/qudefect/jobs");
        assert!(matches!(
            JobCollector::new(missing).collect(),
            Err(DefectError::FileNotFound { .. })
        ));
    }
}
