use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use healthsync_core::merge::{MergeAction, MergeComparison, MergeDecision};
use healthsync_core::service::{NutritionOptions, NutritionReport, SyncService};
use healthsync_core::workbook::CsvWorkbook;

use super::helpers::{dry_run_note, fmt_date, no_neg_zero, print_json};

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Kcal")]
    kcal: String,
    #[tabled(rename = "Protein")]
    protein: String,
    #[tabled(rename = "Carb")]
    carb: String,
    #[tabled(rename = "Fat")]
    fat: String,
    #[tabled(rename = "Action")]
    action: String,
}

fn action_label(action: MergeAction) -> String {
    match action {
        MergeAction::Insert => "insert".to_string(),
        MergeAction::Update { row_number } => format!("update row {row_number}"),
        MergeAction::Skip { row_number } => format!("unchanged (row {row_number})"),
    }
}

fn day_row(d: &MergeDecision) -> DayRow {
    let m = &d.macros;
    DayRow {
        date: fmt_date(d.date),
        kcal: format!("{:.0}", no_neg_zero(m.kcal)),
        protein: format!("{:.1}", no_neg_zero(m.protein_g)),
        carb: format!("{:.1}", no_neg_zero(m.carb_g)),
        fat: format!("{:.1}", no_neg_zero(m.fat_g)),
        action: action_label(d.action),
    }
}

fn print_report(report: &NutritionReport) {
    println!(
        "Food log: {} rows ({} computed, {} manual, {} skipped)",
        report.food_log_rows, report.computed, report.manual, report.skipped
    );

    if report.plan.decisions.is_empty() {
        println!("No dated entries to merge.");
    } else {
        let rows: Vec<DayRow> = report.plan.decisions.iter().map(day_row).collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    println!(
        "Master table ({} comparison): {} to insert, {} to update, {} unchanged",
        report.comparison,
        report.plan.inserts(),
        report.plan.updates(),
        report.plan.skips()
    );
    if let Some(merged) = &report.merged {
        println!(
            "Wrote {} inserted and {} updated rows in {} batch(es).",
            merged.inserted, merged.updated, merged.batches
        );
    }
    dry_run_note(report.dry_run);
}

pub(crate) fn cmd_nutrition(
    service: &mut SyncService<CsvWorkbook>,
    dry_run: bool,
    compare: Option<MergeComparison>,
    json: bool,
) -> Result<()> {
    let report = service.sync_nutrition(&NutritionOptions {
        dry_run,
        comparison: compare,
    })?;

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}
