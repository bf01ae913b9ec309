use anyhow::Result;
use std::path::PathBuf;

use healthsync_core::service::{CycleDbOptions, SyncService};
use healthsync_core::workbook::CsvWorkbook;

use super::helpers::{dry_run_note, print_json, render_preview};

const PREVIEW_ROWS: usize = 7;

pub(crate) fn cmd_cycle_db(
    service: &mut SyncService<CsvWorkbook>,
    tab: Option<String>,
    snapshot: Option<PathBuf>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let report = service.build_cycle_db(&CycleDbOptions {
        dry_run,
        tab,
        snapshot,
    })?;

    if json {
        return print_json(&report);
    }

    println!("Combined tabs: {}", report.tabs.join(", "));
    println!("{}", render_preview(&report.table, PREVIEW_ROWS));
    let verb = if dry_run { "Would write" } else { "Wrote" };
    println!("{verb} {} rows to {}", report.rows, report.destination);
    if let Some(path) = &report.snapshot {
        println!("Snapshot saved to {}", path.display());
    }
    dry_run_note(dry_run);
    Ok(())
}
