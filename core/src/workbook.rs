//! CSV-backed spreadsheet store.
//!
//! A spreadsheet is a directory and each tab a `<tab>.csv` file inside it.
//! Cells are kept as text; numbers written by the pipelines come back as
//! their text rendering, which every decoder accepts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::table::{
    Cell, CellRef, Locator, RangeUpdate, Table, TableReader, TableWriter, append, paste,
    paste_update,
};

#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    root: PathBuf,
}

impl CsvWorkbook {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a spreadsheet. Relative ids resolve against the root.
    #[must_use]
    pub fn spreadsheet_dir(&self, spreadsheet: &str) -> PathBuf {
        let path = Path::new(spreadsheet);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    #[must_use]
    pub fn tab_path(&self, locator: &Locator) -> PathBuf {
        self.spreadsheet_dir(&locator.spreadsheet)
            .join(format!("{}.csv", locator.tab))
    }

    fn load(&self, locator: &Locator) -> Result<Vec<Vec<Cell>>> {
        let path = self.tab_path(locator);
        if !path.exists() {
            anyhow::bail!("Tab not found: {locator} ({})", path.display());
        }
        read_grid(&path)
    }

    fn store(&self, locator: &Locator, grid: &[Vec<Cell>]) -> Result<()> {
        let path = self.tab_path(locator);
        write_grid(&path, grid)?;
        debug!(tab = %locator, rows = grid.len(), "saved tab");
        Ok(())
    }

    fn modify(&self, locator: &Locator, f: impl FnOnce(&mut Vec<Vec<Cell>>) -> Result<()>) -> Result<()> {
        let mut grid = self.load(locator)?;
        f(&mut grid)?;
        self.store(locator, &grid)
    }
}

fn read_grid(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut grid = Vec::new();
    for (line_num, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to parse {} row {}", path.display(), line_num + 1))?;
        grid.push(record.iter().map(Cell::text).collect());
    }
    Ok(grid)
}

fn write_grid(path: &Path, grid: &[Vec<Cell>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in grid {
        let mut line: Vec<String> = row.iter().map(ToString::to_string).collect();
        line.resize(width, String::new());
        wtr.write_record(&line)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Save a table as a standalone CSV file, header first.
pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    write_grid(path, &table.to_grid())
}

impl TableReader for CsvWorkbook {
    fn read_table(&self, locator: &Locator) -> Result<Table> {
        Ok(Table::from_grid(self.load(locator)?))
    }

    fn list_tabs(&self, spreadsheet: &str) -> Result<Vec<String>> {
        let dir = self.spreadsheet_dir(spreadsheet);
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list spreadsheet: {}", dir.display()))?;

        let mut tabs = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list spreadsheet: {}", dir.display()))?
                .path();
            if !path.extension().is_some_and(|ext| ext == "csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tabs.push(stem.to_string());
            }
        }
        tabs.sort();
        Ok(tabs)
    }
}

impl TableWriter for CsvWorkbook {
    fn write_range(
        &mut self,
        locator: &Locator,
        top_left: CellRef,
        rows: &[Vec<Option<Cell>>],
    ) -> Result<()> {
        self.modify(locator, |grid| {
            paste(grid, top_left, rows);
            Ok(())
        })
    }

    fn batch_update(&mut self, locator: &Locator, updates: &[RangeUpdate]) -> Result<()> {
        self.modify(locator, |grid| {
            for update in updates {
                paste_update(grid, update)?;
            }
            Ok(())
        })
    }

    fn append_rows(&mut self, locator: &Locator, rows: &[Vec<Cell>]) -> Result<()> {
        self.modify(locator, |grid| {
            append(grid, rows);
            Ok(())
        })
    }

    /// A CSV file has no fixed size, so this only creates or truncates it.
    fn clear_and_resize(
        &mut self,
        locator: &Locator,
        _min_rows: usize,
        _min_cols: usize,
    ) -> Result<()> {
        self.store(locator, &[])
    }
}
