//! # elph 子命令实现
//!
//! 读取交叠文件，计算缺陷态与同一 (k-point, spin) 上其它能带之间的电声耦合。
//!
//! ## 依赖关系
//! - 使用 `cli/elph.rs` 定义的参数
//! - 使用 `commands::load_defect`, `parsers/json.rs`, `defect/elph.rs`
//! - 使用 `utils/output.rs`, `utils/export.rs`

use crate::cli::elph::ElphArgs;
use crate::commands::{load_defect, sci};
use crate::defect::electron_phonon_coupling;
use crate::error::{DefectError, Result};
use crate::models::{BandIndex, Spin};
use crate::parsers;
use crate::utils::{export, output};

use tabled::{Table, Tabled};

/// 矩阵元表格行
#[derive(Debug, Clone, Tabled)]
struct ElementRow {
    #[tabled(rename = "Band f")]
    band: usize,
    #[tabled(rename = "ε_f (eV)")]
    eigenvalue: String,
    #[tabled(rename = "Re W")]
    re: String,
    #[tabled(rename = "Im W")]
    im: String,
    #[tabled(rename = "|W| (eV amu^-1/2 Å^-1)")]
    magnitude: String,
}

/// 执行电声耦合计算
pub fn execute(args: ElphArgs) -> Result<()> {
    output::print_header("Electron-Phonon Coupling");

    let overlaps = parsers::parse_overlap_file(&args.overlaps)?;
    output::print_info(&format!(
        "Loaded overlaps for steps {:?} from '{}'",
        overlaps.steps(),
        args.overlaps.display()
    ));

    let defect = load_defect(&args.input, args.locator.options())?.with_overlaps(overlaps)?;

    let state = match args.band {
        Some(band) => {
            let spin = Spin::from_index(args.spin.unwrap_or(0))?;
            BandIndex::new(band, args.kpoint, spin)
        }
        None => {
            let spin = args.spin.map(Spin::from_index).transpose()?;
            let entry = match spin {
                Some(s) => defect.defect_band().get(args.kpoint, s),
                None => defect.defect_band().at_kpoint(args.kpoint),
            };
            *entry.ok_or_else(|| {
                DefectError::MissingInput(format!(
                    "defect band entry for k-point {}; pass --band explicitly",
                    args.kpoint
                ))
            })?
        }
    };

    let result = electron_phonon_coupling(&defect, state, args.phase)?;
    let electronic = defect.relaxed_electronic()?;

    output::print_field("Defect state", &state.to_string());
    output::print_field("Phase convention", &args.phase.to_string());
    output::print_field("Derivative", &result.method.to_string());

    let mut rows = Vec::with_capacity(result.elements.len());
    let mut csv_rows = Vec::with_capacity(result.elements.len());
    for (&band, w) in &result.elements {
        let eps = electronic.eigenvalue(&BandIndex::new(band, state.kpoint, state.spin))?;
        rows.push(ElementRow {
            band,
            eigenvalue: format!("{:.4}", eps),
            re: sci(w.re),
            im: sci(w.im),
            magnitude: sci(w.norm()),
        });
        csv_rows.push(vec![
            band.to_string(),
            format!("{:.8}", eps),
            format!("{:.10e}", w.re),
            format!("{:.10e}", w.im),
            format!("{:.10e}", w.norm()),
        ]);
    }
    println!("\n{}", Table::new(&rows));

    if let Some(path) = &args.output {
        export::write_csv(
            path,
            &["band_f", "eps_f_eV", "re_W", "im_W", "abs_W"],
            csv_rows,
        )?;
        output::print_written("Matrix elements", path);
    }

    Ok(())
}
