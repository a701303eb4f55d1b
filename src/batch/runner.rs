//! # 批量作业执行器
//!
//! 并行执行互相独立的 SRH 作业，每个作业内部是单线程数值核心。
//!
//! ## 功能
//! - 基于 rayon 线程池的并行迭代
//! - 进度条显示
//! - 失败收集与汇总报告（单个作业失败不影响其它作业）
//!
//! ## 依赖关系
//! - 被 `commands/srh.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{DefectError, Result};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;

/// 单个作业的执行结果
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// 完成，附输出文件
    Completed { job: PathBuf, output: PathBuf },
    /// 跳过（输出已存在）
    Skipped { job: PathBuf, reason: String },
    /// 失败，附完整错误链
    Failed { job: PathBuf, error: String },
}

/// 批量执行统计，各列表保持作业输入顺序
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// (作业文件, 输出文件)
    pub completed: Vec<(PathBuf, PathBuf)>,
    /// (作业文件, 跳过原因)
    pub skipped: Vec<(PathBuf, String)>,
    /// (作业文件, 错误信息)
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn merge(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed { job, output } => self.completed.push((job, output)),
            JobOutcome::Skipped { job, reason } => self.skipped.push((job, reason)),
            JobOutcome::Failed { job, error } => self.failed.push((job, error)),
        }
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.failed.len()
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// `jobs == 0` 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理作业列表
    pub fn run<F>(&self, files: Vec<PathBuf>, processor: F) -> Result<BatchSummary>
    where
        F: Fn(&PathBuf) -> JobOutcome + Sync + Send,
    {
        let pb = progress::create_progress_bar(files.len() as u64, "SRH jobs");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| DefectError::Other(format!("failed to build thread pool: {}", e)))?;

        let outcomes: Vec<JobOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let outcome = processor(file);
                    if let JobOutcome::Failed { job, .. } = &outcome {
                        pb.println(format!("failed: {}", job.display()));
                    }
                    pb.inc(1);
                    outcome
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            summary.merge(outcome);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_outcomes() {
        let files: Vec<PathBuf> = (0..6).map(|i| PathBuf::from(format!("job{}.toml", i))).collect();
        let runner = BatchRunner::new(2);
        let summary = runner
            .run(files, |job| {
                let name = job.display().to_string();
                if name.contains('3') {
                    JobOutcome::Failed {
                        job: job.clone(),
                        error: "boom".to_string(),
                    }
                } else if name.contains('5') {
                    JobOutcome::Skipped {
                        job: job.clone(),
                        reason: "exists".to_string(),
                    }
                } else {
                    JobOutcome::Completed {
                        job: job.clone(),
                        output: job.with_extension("csv"),
                    }
                }
            })
            .unwrap();

        assert_eq!(summary.total(), 6);
        assert_eq!(summary.completed.len(), 4);
        assert_eq!(
            summary.completed[0],
            (PathBuf::from("job0.toml"), PathBuf::from("job0.csv"))
        );
        assert_eq!(summary.skipped, vec![(PathBuf::from("job5.toml"), "exists".to_string())]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, PathBuf::from("job3.toml"));
    }

    #[test]
    fn test_zero_jobs_uses_all_cpus() {
        assert_eq!(BatchRunner::new(0).jobs(), num_cpus::get());
    }
}
