//! # pes 子命令实现
//!
//! 拟合位形坐标势能面，输出 ω、ħω 和样本残差。
//!
//! ## 依赖关系
//! - 使用 `cli/pes.rs` 定义的参数
//! - 使用 `commands::load_defect`
//! - 使用 `utils/output.rs`, `utils/export.rs`

use crate::cli::pes::PesArgs;
use crate::commands::load_defect;
use crate::error::Result;
use crate::utils::{export, output};

use tabled::{Table, Tabled};

/// 样本表格行
#[derive(Debug, Clone, Tabled)]
struct SampleRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Q (amu^1/2 Å)")]
    q: String,
    #[tabled(rename = "E (eV)")]
    energy: String,
    #[tabled(rename = "E_fit (eV)")]
    fitted: String,
    #[tabled(rename = "Residual (meV)")]
    residual: String,
}

/// 执行势能面拟合
pub fn execute(args: PesArgs) -> Result<()> {
    output::print_header("Harmonic PES Fit");

    let defect = load_defect(&args.input, args.locator.options())?;
    let fit = defect.fit();

    output::print_field("Defect", defect.name());
    if let Some(q) = defect.charge_state() {
        output::print_field("Charge state", &format!("{:+}", q));
    }
    output::print_field(
        "Relaxed step",
        &format!("{} ({})", defect.relaxed_index(), defect.relaxed_step().name),
    );
    if let Some(cell) = defect.relaxed_structure() {
        output::print_field(
            "Cell",
            &format!("{} ({} atoms, {:.3} A^3)", cell.formula(), cell.atoms.len(), cell.volume()),
        );
    }
    match defect.detection() {
        Some(d) if d.ambiguous => output::print_warning(
            "Defect band detection was ambiguous; run `locate` for the candidates",
        ),
        Some(_) => output::print_field("Defect band", "detected"),
        None => output::print_field("Defect band", "from input file"),
    }
    output::print_field("omega", &format!("{:.6} eV^1/2 amu^-1/2 A^-1", defect.omega()));
    output::print_field("hbar*omega", &format!("{:.3} meV", fit.hbar_omega() * 1000.0));
    output::print_field("Q0", &format!("{:.6} amu^1/2 A", fit.q0));
    output::print_field("E0", &format!("{:.6} eV", fit.e0));
    output::print_field("RMS residual", &format!("{:.3} meV", fit.rms_residual * 1000.0));

    let energies = defect.energies();
    let rows: Vec<SampleRow> = defect
        .steps()
        .iter()
        .zip(defect.distortions().iter().zip(energies.iter()))
        .map(|(step, (&q, &e))| {
            let fitted = fit.energy_at(q);
            SampleRow {
                step: step.name.clone(),
                q: format!("{:.5}", q),
                energy: format!("{:.6}", e),
                fitted: format!("{:.6}", fitted),
                residual: format!("{:.3}", (e - fitted) * 1000.0),
            }
        })
        .collect();
    println!("\n{}", Table::new(&rows));

    if let Some(path) = &args.output {
        let csv_rows = defect
            .distortions()
            .iter()
            .zip(energies.iter())
            .map(|(&q, &e)| {
                vec![
                    format!("{:.10}", q),
                    format!("{:.10}", e),
                    format!("{:.10}", fit.energy_at(q)),
                ]
            });
        export::write_csv(path, &["Q_amu05_A", "E_eV", "E_fit_eV"], csv_rows)?;
        output::print_written("PES samples", path);
    }

    Ok(())
}
