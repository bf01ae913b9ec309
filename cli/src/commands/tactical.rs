use anyhow::Result;

use healthsync_core::service::SyncService;
use healthsync_core::workbook::CsvWorkbook;

use super::helpers::{dry_run_note, print_json, render_preview};

const PREVIEW_ROWS: usize = 7;

pub(crate) fn cmd_tactical(
    service: &mut SyncService<CsvWorkbook>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let report = service.build_tactical(dry_run)?;

    if json {
        return print_json(&report);
    }

    println!("{}", render_preview(&report.table, PREVIEW_ROWS));
    let verb = if dry_run { "Would write" } else { "Wrote" };
    println!(
        "{verb} {} rows x {} columns to {}",
        report.rows,
        report.header.len(),
        report.destination
    );
    dry_run_note(dry_run);
    Ok(())
}
