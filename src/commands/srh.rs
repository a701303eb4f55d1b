//! # srh 子命令实现
//!
//! 输入为单个作业文件时直接计算并打印结果；输入为目录时收集作业文件并行执行。
//!
//! ## 依赖关系
//! - 使用 `cli/srh.rs` 定义的参数
//! - 使用 `config.rs` 的 SrhJob
//! - 使用 `batch/` 进行目录模式批处理
//! - 使用 `defect/srh.rs` 计算俘获系数
//! - 使用 `anyhow` 为作业错误附加上下文

use crate::batch::{BatchRunner, JobCollector, JobOutcome};
use crate::cli::srh::SrhArgs;
use crate::commands::{load_defect, sci};
use crate::config::SrhJob;
use crate::defect::{LocatorOptions, SrhCapture, SrhResult};
use crate::error::{DefectError, Result};
use crate::parsers;
use crate::utils::{export, output, progress};

use anyhow::Context;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 俘获系数表格行
#[derive(Debug, Clone, Tabled)]
struct CoefficientRow {
    #[tabled(rename = "T (K)")]
    temperature: String,
    #[tabled(rename = "C (cm³/s)")]
    coefficient: String,
}

/// 执行 SRH 计算
pub fn execute(args: SrhArgs) -> Result<()> {
    let collector = JobCollector::new(args.input.clone())
        .with_pattern(&args.pattern)
        .recursive(args.recursive);

    if collector.is_single_file() {
        run_single(&args.input, args.overwrite)
    } else {
        run_batch(&args, collector)
    }
}

/// 单个作业：打印摘要和结果表
fn run_single(path: &Path, overwrite: bool) -> Result<()> {
    output::print_header("SRH Capture Coefficient");

    let job = SrhJob::from_file(path)?;
    let out = job.output_path();
    if out.exists() && !overwrite {
        output::print_skip(&format!(
            "'{}' exists (use --overwrite to recompute)",
            out.display()
        ));
        return Ok(());
    }

    let result = compute(&job, true).map_err(|e| DefectError::Other(format!("{:#}", e)))?;

    let inputs = &result.inputs;
    output::print_field("Job", &job.display_name());
    output::print_field("dQ", &format!("{:.4} amu^1/2 A", inputs.dq));
    output::print_field("dE", &format!("{:.4} eV", inputs.energy_offset));
    output::print_field(
        "hbar*omega (i / f)",
        &format!(
            "{:.2} / {:.2} meV",
            inputs.hbar_omega_i * 1000.0,
            inputs.hbar_omega_f * 1000.0
        ),
    );
    output::print_field("W", &format!("{} eV amu^-1/2 A^-1", sci(inputs.elph)));
    output::print_field("Volume", &format!("{:.3} A^3", inputs.volume));
    output::print_field("sigma", &format!("{:.4} eV", result.sigma));
    output::print_field(
        "Levels (Ni / Nf)",
        &format!("{} / {}", result.levels.0, result.levels.1),
    );

    let rows: Vec<CoefficientRow> = result
        .temperatures
        .iter()
        .zip(result.coefficients.iter())
        .map(|(t, c)| CoefficientRow {
            temperature: format!("{:.1}", t),
            coefficient: sci(*c),
        })
        .collect();
    println!("\n{}", Table::new(&rows));

    write_result(&out, &result)?;
    output::print_written("Capture coefficients", &out);
    Ok(())
}

/// 目录模式：并行执行所有作业
fn run_batch(args: &SrhArgs, collector: JobCollector) -> Result<()> {
    output::print_header("SRH Capture Coefficients (batch)");

    let files = collector.collect()?;
    if files.is_empty() {
        output::print_warning(&format!(
            "No job files matching '{}' in '{}'",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Running {} job(s) on {} thread(s)",
        files.len(),
        runner.jobs()
    ));

    let overwrite = args.overwrite;
    let summary = runner.run(files, |path| process_job(path, overwrite))?;

    for (job, out) in &summary.completed {
        output::print_success(&format!("{} -> {}", job.display(), out.display()));
    }
    for (job, reason) in &summary.skipped {
        output::print_skip(&format!("{}: {}", job.display(), reason));
    }
    for (job, error) in &summary.failed {
        output::print_error(&format!("{}: {}", job.display(), error));
    }

    output::print_separator();
    output::print_done(&format!(
        "{} completed, {} skipped, {} failed (of {})",
        summary.completed.len(),
        summary.skipped.len(),
        summary.failed.len(),
        summary.total()
    ));

    if !summary.failed.is_empty() {
        return Err(DefectError::Other(format!(
            "{} of {} SRH jobs failed",
            summary.failed.len(),
            summary.total()
        )));
    }
    Ok(())
}

/// 批处理中的单个作业，错误转为 Failed
fn process_job(path: &PathBuf, overwrite: bool) -> JobOutcome {
    match try_process_job(path, overwrite) {
        Ok(outcome) => outcome,
        Err(e) => JobOutcome::Failed {
            job: path.clone(),
            error: format!("{:#}", e),
        },
    }
}

fn try_process_job(path: &Path, overwrite: bool) -> anyhow::Result<JobOutcome> {
    let job = SrhJob::from_file(path).context("invalid job file")?;
    let out = job.output_path();
    if out.exists() && !overwrite {
        return Ok(JobOutcome::Skipped {
            job: path.to_path_buf(),
            reason: format!("'{}' exists", out.display()),
        });
    }

    let result = compute(&job, false)?;
    write_result(&out, &result)
        .with_context(|| format!("writing results to '{}'", out.display()))?;
    log::info!("{}: {} temperatures written", job.display_name(), result.coefficients.len());

    Ok(JobOutcome::Completed {
        job: path.to_path_buf(),
        output: out,
    })
}

/// 读取两个电荷态和交叠矩阵并计算俘获系数
fn compute(job: &SrhJob, show_spinner: bool) -> anyhow::Result<SrhResult> {
    let overlaps = parsers::parse_overlap_file(&job.overlaps)
        .with_context(|| format!("loading overlaps '{}'", job.overlaps.display()))?;
    let mut initial = load_defect(&job.initial, LocatorOptions::default())
        .with_context(|| format!("building initial state '{}'", job.initial.display()))?;
    let mut final_ = load_defect(&job.final_, LocatorOptions::default())
        .with_context(|| format!("building final state '{}'", job.final_.display()))?;

    let elph_source = if job.use_final_state_elph {
        final_ = final_.with_overlaps(overlaps)?;
        &final_
    } else {
        initial = initial.with_overlaps(overlaps)?;
        &initial
    };

    let state = match job.defect_state()? {
        Some(state) => state,
        None => *elph_source
            .defect_band()
            .representative()
            .context("defect band of the electron-phonon state is empty")?,
    };

    let capture = SrhCapture::new(&initial, &final_).context("pairing charge states")?;

    let spinner = show_spinner.then(|| progress::create_spinner("Summing vibronic overlaps..."));
    let result = capture
        .capture_coefficients(
            state,
            &job.temperature_values(),
            job.energy_offset,
            &job.options(),
        )
        .with_context(|| format!("capture coefficients for {}", state));
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result
}

fn write_result(path: &Path, result: &SrhResult) -> Result<()> {
    let rows = result
        .temperatures
        .iter()
        .zip(result.coefficients.iter())
        .map(|(t, c)| vec![format!("{:.3}", t), format!("{:.10e}", c)]);
    export::write_csv(path, &["T_K", "C_cm3_per_s"], rows)
}
