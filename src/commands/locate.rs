//! # locate 子命令实现
//!
//! 在弛豫步的电子结构上定位缺陷能带，逐 k 点列出候选态。
//! 文件中显式给出缺陷能带时直接显示，不做检测。
//!
//! ## 依赖关系
//! - 使用 `cli/locate.rs` 定义的参数
//! - 使用 `parsers/json.rs`, `defect/locator.rs`
//! - 使用 `utils/output.rs`

use crate::cli::locate::LocateArgs;
use crate::error::Result;
use crate::parsers;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 候选态表格行
#[derive(Debug, Clone, Tabled)]
struct CandidateRow {
    #[tabled(rename = "K-point")]
    kpoint: usize,
    #[tabled(rename = "Spin")]
    spin: String,
    #[tabled(rename = "Band")]
    band: usize,
    #[tabled(rename = "ε (eV)")]
    eigenvalue: String,
    #[tabled(rename = "Participation")]
    score: String,
    #[tabled(rename = "Runner-up")]
    runner_up: String,
}

/// 执行缺陷能带定位
pub fn execute(args: LocateArgs) -> Result<()> {
    output::print_header("Locating Defect Band");

    let input = parsers::parse_defect_file(&args.input)?;
    output::print_info(&format!(
        "Loaded '{}' with {} distortion steps",
        input.name,
        input.steps.len()
    ));

    let builder = input.into_builder(args.locator.options()).locate()?;
    log::debug!("Builder stage: {}", builder.stage());
    let relaxed = builder.resolve_relaxed_index()?;
    let relaxed_step = &builder.steps()[relaxed];
    output::print_field("Relaxed step", &format!("{} ({})", relaxed, relaxed_step.name));

    let Some((band, detection)) = builder.located() else {
        output::print_warning("Defect band could not be resolved.");
        return Ok(());
    };

    let Some(detection) = detection else {
        output::print_info("Using the defect band given in the input file:");
        for entry in band.entries() {
            println!("  {}", entry);
        }
        return Ok(());
    };

    if let Some(data) = relaxed_step.electronic.as_ref() {
        output::print_field("Fermi level", &format!("{:.4} eV", data.efermi));
    }
    output::print_field("Tie-break", &args.locator.tie_break.to_string());
    for (spin, score) in &detection.spin_scores {
        output::print_field(
            &format!("Mean score ({})", spin),
            &format!("{:.4}", score),
        );
    }

    let rows: Vec<CandidateRow> = detection
        .candidates
        .iter()
        .map(|c| CandidateRow {
            kpoint: c.index.kpoint,
            spin: c.index.spin.to_string(),
            band: c.index.band,
            eigenvalue: format!("{:.4}", c.eigenvalue),
            score: format!("{:.4}", c.score),
            runner_up: c
                .runner_up
                .map(|r| format!("{:.4}", r))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("\n{}", Table::new(&rows));

    if detection.ambiguous {
        for note in &detection.notes {
            output::print_warning(note);
        }
    } else {
        output::print_success(&format!(
            "Defect band located: {} k-point(s), consistent band index",
            band.nkpoints()
        ));
    }

    Ok(())
}
