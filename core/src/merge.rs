//! Reconcile daily totals against the master table, one decision per date.
//!
//! Inserts append a fresh row; updates overwrite only the four macro cells of
//! the existing row; everything else in the master table is left alone.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{DailyTotal, Macros, MasterRow, columns};
use crate::normalize::{format_sheet_date, round0, round1};
use crate::table::{Cell, CellRange, CellRef, Locator, RangeUpdate, TableWriter, column_index};

pub const DEFAULT_BATCH_SIZE: usize = 60;

const EPSILON: f64 = 1e-9;

/// Which fields decide whether a stored day differs from the computed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeComparison {
    /// Calories only, rounded to a whole number.
    #[default]
    Kcal,
    /// Calories plus protein, carb and fat (one decimal).
    All,
}

impl FromStr for MergeComparison {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kcal" => Ok(MergeComparison::Kcal),
            "all" => Ok(MergeComparison::All),
            other => bail!("Unknown merge comparison '{other}' (expected kcal or all)"),
        }
    }
}

impl fmt::Display for MergeComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeComparison::Kcal => f.write_str("kcal"),
            MergeComparison::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MergeAction {
    Insert,
    Update { row_number: usize },
    Skip { row_number: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeDecision {
    pub date: NaiveDate,
    /// Values as they would be written.
    pub macros: Macros,
    #[serde(flatten)]
    pub action: MergeAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergePlan {
    pub decisions: Vec<MergeDecision>,
}

impl MergePlan {
    fn count(&self, pred: impl Fn(&MergeAction) -> bool) -> usize {
        self.decisions.iter().filter(|d| pred(&d.action)).count()
    }

    #[must_use]
    pub fn inserts(&self) -> usize {
        self.count(|a| matches!(a, MergeAction::Insert))
    }

    #[must_use]
    pub fn updates(&self) -> usize {
        self.count(|a| matches!(a, MergeAction::Update { .. }))
    }

    #[must_use]
    pub fn skips(&self) -> usize {
        self.count(|a| matches!(a, MergeAction::Skip { .. }))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub batches: usize,
}

/// Master-table values are written with whole calories and one-decimal macros.
#[must_use]
pub fn written_values(m: &Macros) -> Macros {
    Macros::new(round0(m.kcal), round1(m.protein_g), round1(m.carb_g), round1(m.fat_g))
}

fn same(a: f64, b: Option<f64>, round: fn(f64) -> f64) -> bool {
    b.is_some_and(|b| (round(a) - round(b)).abs() < EPSILON)
}

pub struct CycleTableMerger {
    comparison: MergeComparison,
    batch_size: usize,
}

impl Default for CycleTableMerger {
    fn default() -> Self {
        Self::new(MergeComparison::default(), DEFAULT_BATCH_SIZE)
    }
}

impl CycleTableMerger {
    #[must_use]
    pub fn new(comparison: MergeComparison, batch_size: usize) -> Self {
        Self {
            comparison,
            batch_size: batch_size.max(1),
        }
    }

    fn unchanged(&self, total: &Macros, row: &MasterRow) -> bool {
        let kcal = same(total.kcal, row.kcal, round0);
        match self.comparison {
            MergeComparison::Kcal => kcal,
            MergeComparison::All => {
                kcal && same(total.protein_g, row.protein_g, round1)
                    && same(total.carb_g, row.carb_g, round1)
                    && same(total.fat_g, row.fat_g, round1)
            }
        }
    }

    /// Decide insert / update / skip for every daily total.
    #[must_use]
    pub fn plan(&self, totals: &[DailyTotal], master: &[MasterRow]) -> MergePlan {
        let mut by_date: HashMap<NaiveDate, &MasterRow> = HashMap::new();
        for row in master {
            let Some(date) = row.date else { continue };
            if let Some(first) = by_date.get(&date) {
                warn!(
                    date = %format_sheet_date(date),
                    kept = first.row_number,
                    ignored = row.row_number,
                    "duplicate date in master table, using first row"
                );
                continue;
            }
            by_date.insert(date, row);
        }

        let decisions = totals
            .iter()
            .map(|total| {
                let action = match by_date.get(&total.date) {
                    None => MergeAction::Insert,
                    Some(row) if self.unchanged(&total.macros, row) => MergeAction::Skip {
                        row_number: row.row_number,
                    },
                    Some(row) => MergeAction::Update {
                        row_number: row.row_number,
                    },
                };
                MergeDecision {
                    date: total.date,
                    macros: written_values(&total.macros),
                    action,
                }
            })
            .collect();

        MergePlan { decisions }
    }

    /// Single-cell macro writes for every update, split into batches.
    #[must_use]
    pub fn update_ranges(&self, plan: &MergePlan, header: &[String]) -> Vec<Vec<RangeUpdate>> {
        let macro_cols: Vec<Option<usize>> = columns::MASTER_MACROS
            .iter()
            .map(|name| column_index(header, name))
            .collect();

        let mut ranges = Vec::new();
        for decision in &plan.decisions {
            let MergeAction::Update { row_number } = decision.action else {
                continue;
            };
            let m = decision.macros;
            for (col, value) in macro_cols.iter().zip([m.kcal, m.protein_g, m.carb_g, m.fat_g]) {
                let Some(col) = col else { continue };
                ranges.push(RangeUpdate {
                    range: CellRange::single(CellRef::new(row_number, col + 1)),
                    values: vec![vec![Cell::Number(value)]],
                });
            }
        }

        ranges
            .chunks(self.batch_size)
            .map(<[RangeUpdate]>::to_vec)
            .collect()
    }

    /// New master rows: date and macros set, every other column blank.
    #[must_use]
    pub fn insert_rows(&self, plan: &MergePlan, header: &[String]) -> Vec<Vec<Cell>> {
        let idx_date = column_index(header, columns::DATE);
        let macro_cols: Vec<Option<usize>> = columns::MASTER_MACROS
            .iter()
            .map(|name| column_index(header, name))
            .collect();

        plan.decisions
            .iter()
            .filter(|d| d.action == MergeAction::Insert)
            .map(|d| {
                let mut row = vec![Cell::Empty; header.len()];
                if let Some(i) = idx_date {
                    row[i] = Cell::text(format_sheet_date(d.date));
                }
                let m = d.macros;
                for (col, value) in macro_cols.iter().zip([m.kcal, m.protein_g, m.carb_g, m.fat_g]) {
                    if let Some(i) = col {
                        row[*i] = Cell::Number(value);
                    }
                }
                row
            })
            .collect()
    }

    /// Write the plan: batched updates first, then one append for the inserts.
    pub fn apply<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        locator: &Locator,
        header: &[String],
        plan: &MergePlan,
    ) -> Result<MergeSummary> {
        let batches = self.update_ranges(plan, header);
        for (i, batch) in batches.iter().enumerate() {
            debug!(batch = i + 1, ranges = batch.len(), "writing master updates");
            writer
                .batch_update(locator, batch)
                .with_context(|| format!("Failed to update {locator}"))?;
        }

        let inserts = self.insert_rows(plan, header);
        if !inserts.is_empty() {
            writer
                .append_rows(locator, &inserts)
                .with_context(|| format!("Failed to append to {locator}"))?;
        }

        let summary = MergeSummary {
            inserted: inserts.len(),
            updated: plan.updates(),
            skipped: plan.skips(),
            batches: batches.len(),
        };
        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "master table merged"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_master;
    use crate::memory::MemoryStore;
    use crate::table::{Table, TableReader};

    fn day(d: u32, kcal: f64) -> DailyTotal {
        DailyTotal {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            macros: Macros::new(kcal, 10.04, 20.0, 5.0),
            entries: 1,
        }
    }

    fn master_table() -> Table {
        Table::from_grid(vec![
            ["Date", "Kcal", "Protein (g)", "Carb (g)", "Fat (g)", "Weight", "Notes"]
                .iter()
                .map(|s| Cell::text(*s))
                .collect(),
            ["01/01/2024", "1500", "10", "20", "5", "61.2", "rest day"]
                .iter()
                .map(|s| Cell::text(*s))
                .collect(),
            ["02/01/2024", "", "", "", "", "61.0", ""]
                .iter()
                .map(|s| Cell::text(*s))
                .collect(),
        ])
    }

    fn store_with_master() -> (MemoryStore, Locator) {
        let loc = Locator::new("master", "Sheet1");
        let mut store = MemoryStore::default();
        store.insert_table(&loc, &master_table());
        (store, loc)
    }

    fn run(store: &mut MemoryStore, loc: &Locator, totals: &[DailyTotal]) -> MergeSummary {
        let table = store.read_table(loc).unwrap();
        let master = decode_master(&table).unwrap();
        let merger = CycleTableMerger::default();
        let plan = merger.plan(totals, &master);
        merger.apply(store, loc, &table.header, &plan).unwrap()
    }

    #[test]
    fn test_plan_insert_update_skip() {
        let master = decode_master(&master_table()).unwrap();
        let merger = CycleTableMerger::default();
        let plan = merger.plan(&[day(1, 1500.4), day(2, 1800.0), day(3, 900.0)], &master);
        assert_eq!(plan.decisions[0].action, MergeAction::Skip { row_number: 2 });
        assert_eq!(plan.decisions[1].action, MergeAction::Update { row_number: 3 });
        assert_eq!(plan.decisions[2].action, MergeAction::Insert);
        assert_eq!((plan.inserts(), plan.updates(), plan.skips()), (1, 1, 1));
    }

    #[test]
    fn test_all_comparison_catches_macro_changes() {
        let master = decode_master(&master_table()).unwrap();
        let total = DailyTotal {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            macros: Macros::new(1500.0, 12.0, 20.0, 5.0),
            entries: 3,
        };
        let kcal_only = CycleTableMerger::new(MergeComparison::Kcal, 60).plan(&[total.clone()], &master);
        assert_eq!(kcal_only.skips(), 1);
        let all = CycleTableMerger::new(MergeComparison::All, 60).plan(&[total], &master);
        assert_eq!(all.updates(), 1);
    }

    #[test]
    fn test_duplicate_master_dates_first_wins() {
        let mut table = master_table();
        table.rows.push(
            ["01/01/2024", "2000", "", "", "", "", ""]
                .iter()
                .map(|s| Cell::text(*s))
                .collect(),
        );
        let master = decode_master(&table).unwrap();
        let plan = CycleTableMerger::default().plan(&[day(1, 1500.0)], &master);
        assert_eq!(plan.decisions[0].action, MergeAction::Skip { row_number: 2 });
    }

    #[test]
    fn test_update_touches_only_macro_cells() {
        let (mut store, loc) = store_with_master();
        let summary = run(&mut store, &loc, &[day(1, 1650.0)]);
        assert_eq!(summary.updated, 1);

        let after = store.read_table(&loc).unwrap();
        let row = &after.rows[0];
        assert_eq!(row[0].as_text(), "01/01/2024");
        assert_eq!(row[1], Cell::Number(1650.0));
        assert_eq!(row[2], Cell::Number(10.0));
        assert_eq!(row[5].as_text(), "61.2");
        assert_eq!(row[6].as_text(), "rest day");
        assert_eq!(after.rows[1], master_table().rows[1]);
    }

    #[test]
    fn test_insert_leaves_other_columns_blank() {
        let (mut store, loc) = store_with_master();
        let summary = run(&mut store, &loc, &[day(5, 2100.26)]);
        assert_eq!(summary.inserted, 1);

        let after = store.read_table(&loc).unwrap();
        assert_eq!(after.len(), 3);
        let row = &after.rows[2];
        assert_eq!(row[0].as_text(), "05/01/2024");
        assert_eq!(row[1], Cell::Number(2100.0));
        assert_eq!(row[2], Cell::Number(10.0));
        assert!(row[5].is_blank());
        assert!(row[6].is_blank());
    }

    #[test]
    fn test_second_merge_is_all_skips() {
        let (mut store, loc) = store_with_master();
        let totals = [day(1, 1510.0), day(2, 1800.0), day(3, 900.0)];
        let first = run(&mut store, &loc, &totals);
        assert_eq!((first.inserted, first.updated), (1, 2));

        let second = run(&mut store, &loc, &totals);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(store.read_table(&loc).unwrap().len(), 3);
    }

    #[test]
    fn test_updates_are_batched() {
        let master = decode_master(&master_table()).unwrap();
        let merger = CycleTableMerger::new(MergeComparison::Kcal, 3);
        let plan = merger.plan(&[day(1, 1.0), day(2, 2.0)], &master);
        let header = master_table().header;
        let batches = merger.update_ranges(&plan, &header);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 2]);
        assert_eq!(batches[0][0].range.to_string(), "B2");
    }

    #[test]
    fn test_comparison_from_str() {
        assert_eq!("KCAL".parse::<MergeComparison>().unwrap(), MergeComparison::Kcal);
        assert_eq!("all".parse::<MergeComparison>().unwrap(), MergeComparison::All);
        assert!("fat".parse::<MergeComparison>().is_err());
    }
}
