//! # optics 子命令实现
//!
//! 计算价带→缺陷态、缺陷态→导带两类跃迁的介电函数贡献。
//!
//! ## 依赖关系
//! - 使用 `cli/optics.rs` 定义的参数
//! - 使用 `commands::load_defect`, `parsers/json.rs`, `defect/optics.rs`
//! - 使用 `utils/output.rs`, `utils/export.rs`

use crate::cli::optics::OpticsArgs;
use crate::commands::load_defect;
use crate::defect::{defect_dielectric_function, TransitionClass};
use crate::error::Result;
use crate::parsers;
use crate::utils::{export, output};

use tabled::{Table, Tabled};

/// 峰值表格行
#[derive(Debug, Clone, Tabled)]
struct PeakRow {
    #[tabled(rename = "Transitions")]
    class: String,
    #[tabled(rename = "Peak E (eV)")]
    energy: String,
    #[tabled(rename = "max ε₂")]
    imag: String,
    #[tabled(rename = "ε₁(0)")]
    static_real: String,
}

/// 执行介电函数计算
pub fn execute(args: OpticsArgs) -> Result<()> {
    output::print_header("Defect Dielectric Function");

    let dipoles = parsers::parse_dipole_file(&args.dipoles)?;
    let (nb, nk, ns) = dipoles.shape();
    output::print_info(&format!(
        "Loaded dipoles for {} bands, {} k-points, {} spin(s)",
        nb, nk, ns
    ));

    let defect = load_defect(&args.input, args.locator.options())?.with_dipoles(dipoles)?;
    let opts = args.options();
    let spectrum = defect_dielectric_function(&defect, args.idir, args.jdir, &opts)?;

    output::print_field("Direction pair", &format!("{}{}", args.idir, args.jdir));
    let occupations = match spectrum.occupations.efermi() {
        Some(ef) => format!("Fermi-Dirac, E_F = {:.4} eV", ef),
        None => "computed".to_string(),
    };
    output::print_field("Occupations", &occupations);
    if let Some(state) = defect.defect_band().representative() {
        output::print_field("Defect state", &state.to_string());
    }

    let rows: Vec<PeakRow> = [TransitionClass::ValenceToDefect, TransitionClass::DefectToConduction]
        .iter()
        .map(|&class| {
            let eps = spectrum.component(class);
            let (peak, max) = eps
                .iter()
                .enumerate()
                .map(|(n, z)| (n, z.im))
                .fold((0, 0.0_f64), |best, cur| if cur.1 > best.1 { cur } else { best });
            PeakRow {
                class: class.label().to_string(),
                energy: format!("{:.3}", spectrum.energies[peak]),
                imag: format!("{:.4e}", max),
                static_real: format!("{:.4e}", eps.first().map(|z| z.re).unwrap_or(0.0)),
            }
        })
        .collect();
    println!("\n{}", Table::new(&rows));

    let csv_rows = (0..spectrum.energies.len()).map(|n| {
        let vd = spectrum.valence_to_defect[n];
        let dc = spectrum.defect_to_conduction[n];
        vec![
            format!("{:.5}", spectrum.energies[n]),
            format!("{:.8e}", vd.re),
            format!("{:.8e}", vd.im),
            format!("{:.8e}", dc.re),
            format!("{:.8e}", dc.im),
        ]
    });
    export::write_csv(
        &args.output,
        &[
            "energy_eV",
            "eps1_valence_defect",
            "eps2_valence_defect",
            "eps1_defect_conduction",
            "eps2_defect_conduction",
        ],
        csv_rows,
    )?;
    output::print_written("Dielectric spectrum", &args.output);

    Ok(())
}
