use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::aggregate_daily;
use crate::config::Config;
use crate::cycle_db::build_cycle_db;
use crate::decode::{decode_food_log, decode_master, decode_reference};
use crate::error::SyncError;
use crate::merge::{CycleTableMerger, MergeComparison, MergePlan, MergeSummary};
use crate::models::{DailyTotal, Macros};
use crate::resolver::FoodResolver;
use crate::table::{Cell, CellRef, Locator, Table, TableReader, TableWriter, replace_tab};
use crate::tactical::TacticalBuilder;
use crate::workbook::write_csv;

#[derive(Debug, Clone, Default)]
pub struct NutritionOptions {
    pub dry_run: bool,
    /// Overrides `MERGE_COMPARE`.
    pub comparison: Option<MergeComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutritionReport {
    pub dry_run: bool,
    pub comparison: MergeComparison,
    pub food_log_rows: usize,
    pub computed: usize,
    pub manual: usize,
    pub skipped: usize,
    pub days: Vec<DailyTotal>,
    pub plan: MergePlan,
    /// `None` on a dry run.
    pub merged: Option<MergeSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TacticalReport {
    pub dry_run: bool,
    pub destination: Locator,
    pub rows: usize,
    pub header: Vec<String>,
    #[serde(skip)]
    pub table: Table,
}

#[derive(Debug, Clone, Default)]
pub struct CycleDbOptions {
    pub dry_run: bool,
    /// Overrides `CYCLE_DEST_TAB`.
    pub tab: Option<String>,
    /// Local CSV copy of the combined table.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleDbReport {
    pub dry_run: bool,
    pub destination: Locator,
    pub tabs: Vec<String>,
    pub rows: usize,
    pub snapshot: Option<PathBuf>,
    #[serde(skip)]
    pub table: Table,
}

/// Food-log nutrition block: four cells per row, `None` leaves the row as is.
fn write_back_block(write_back: &[Option<Macros>]) -> Vec<Vec<Option<Cell>>> {
    write_back
        .iter()
        .map(|slot| match slot {
            Some(m) => [m.kcal, m.protein_g, m.carb_g, m.fat_g]
                .into_iter()
                .map(|v| Some(Cell::Number(v)))
                .collect(),
            None => vec![None; 4],
        })
        .collect()
}

/// The write-back block must cover the food log row for row.
fn ensure_aligned(rows: usize, write_back: &[Option<Macros>]) -> Result<(), SyncError> {
    if write_back.len() == rows {
        Ok(())
    } else {
        Err(SyncError::RowCountMismatch {
            expected: rows,
            actual: write_back.len(),
        })
    }
}

/// Runs the sync pipelines over one store.
pub struct SyncService<S> {
    store: S,
    config: Config,
}

impl<S: TableReader + TableWriter> SyncService<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn read(&self, locator: &Locator, what: &str) -> Result<Table> {
        self.store
            .read_table(locator)
            .with_context(|| format!("Failed to read {what} ({locator})"))
    }

    /// Resolve the food log, write the nutrition columns back and merge the
    /// daily totals into the master table.
    pub fn sync_nutrition(&mut self, options: &NutritionOptions) -> Result<NutritionReport> {
        let targets = self.config.nutrition_targets()?;
        let comparison = options.comparison.unwrap_or(self.config.merge_comparison);

        let reference = decode_reference(&self.read(&targets.food_data, "reference table")?)?;
        if reference.is_empty() {
            warn!(tab = %targets.food_data, "reference table has no usable rows");
        }
        let resolver = FoodResolver::new(reference);

        let food_log = self.read(&targets.food_log, "food log")?;
        let entries = decode_food_log(&food_log)?;
        let resolved = resolver.resolve_log(&entries);
        ensure_aligned(food_log.len(), &resolved.write_back)?;

        let days = aggregate_daily(&resolved.records);

        let master = self.read(&targets.master_table, "master table")?;
        let master_rows = decode_master(&master)?;
        let merger = CycleTableMerger::new(comparison, self.config.write_batch_size);
        let plan = merger.plan(&days, &master_rows);
        info!(
            days = days.len(),
            inserts = plan.inserts(),
            updates = plan.updates(),
            skips = plan.skips(),
            "planned master merge"
        );

        let merged = if options.dry_run {
            None
        } else {
            let block = write_back_block(&resolved.write_back);
            if !block.is_empty() {
                let top_left = CellRef::new(2, self.config.nutrition_column);
                self.store
                    .write_range(&targets.food_log, top_left, &block)
                    .with_context(|| format!("Failed to write back to {}", targets.food_log))?;
                info!(rows = block.len(), computed = resolved.computed, "food log updated");
            }
            Some(merger.apply(&mut self.store, &targets.master_table, &master.header, &plan)?)
        };

        Ok(NutritionReport {
            dry_run: options.dry_run,
            comparison,
            food_log_rows: food_log.len(),
            computed: resolved.computed,
            manual: resolved.manual,
            skipped: resolved.skipped,
            days,
            plan,
            merged,
        })
    }

    /// Rebuild the tactical tab from the master table and the activity log.
    pub fn build_tactical(&mut self, dry_run: bool) -> Result<TacticalReport> {
        let targets = self.config.tactical_targets()?;
        let master = self.read(&targets.master_table, "master table")?;
        let activity = self.read(&targets.activity_log, "activity log")?;

        let table = TacticalBuilder::new(self.config.cycle_offset, self.config.cycles_to_display)
            .build(&master, &activity)?;

        if !dry_run {
            replace_tab(&mut self.store, &targets.tactical_db, &table)?;
            info!(tab = %targets.tactical_db, rows = table.len(), "tactical table written");
        }

        Ok(TacticalReport {
            dry_run,
            destination: targets.tactical_db,
            rows: table.len(),
            header: table.header.clone(),
            table,
        })
    }

    /// Combine the cycle tracker tabs into the destination tab.
    pub fn build_cycle_db(&mut self, options: &CycleDbOptions) -> Result<CycleDbReport> {
        let targets = self.config.cycle_db_targets(options.tab.as_deref())?;
        let db = build_cycle_db(&self.store, &targets.source)?;

        if let Some(path) = &options.snapshot {
            save_snapshot(path, &db.table)?;
        }
        if !options.dry_run {
            replace_tab(&mut self.store, &targets.dest, &db.table)?;
            info!(tab = %targets.dest, rows = db.table.len(), "cycle table written");
        }

        Ok(CycleDbReport {
            dry_run: options.dry_run,
            destination: targets.dest,
            tabs: db.tabs,
            rows: db.table.len(),
            snapshot: options.snapshot.clone(),
            table: db.table,
        })
    }
}

fn save_snapshot(path: &Path, table: &Table) -> Result<()> {
    write_csv(path, table).with_context(|| format!("Failed to save snapshot {}", path.display()))?;
    info!(path = %path.display(), rows = table.len(), "saved snapshot");
    Ok(())
}
