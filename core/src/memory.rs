use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::table::{
    Cell, CellRef, Locator, RangeUpdate, Table, TableReader, TableWriter, append, paste,
    paste_update,
};

/// In-process store keyed by locator. Backs tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tabs: BTreeMap<Locator, Vec<Vec<Cell>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, locator: &Locator, table: &Table) {
        self.tabs.insert(locator.clone(), table.to_grid());
    }

    /// Raw grid of a tab, if it exists.
    #[must_use]
    pub fn grid(&self, locator: &Locator) -> Option<&Vec<Vec<Cell>>> {
        self.tabs.get(locator)
    }

    fn grid_mut(&mut self, locator: &Locator) -> Result<&mut Vec<Vec<Cell>>> {
        self.tabs
            .get_mut(locator)
            .with_context(|| format!("Tab not found: {locator}"))
    }
}

impl TableReader for MemoryStore {
    fn read_table(&self, locator: &Locator) -> Result<Table> {
        let grid = self
            .tabs
            .get(locator)
            .with_context(|| format!("Tab not found: {locator}"))?;
        Ok(Table::from_grid(grid.clone()))
    }

    fn list_tabs(&self, spreadsheet: &str) -> Result<Vec<String>> {
        Ok(self
            .tabs
            .keys()
            .filter(|l| l.spreadsheet == spreadsheet)
            .map(|l| l.tab.clone())
            .collect())
    }
}

impl TableWriter for MemoryStore {
    fn write_range(
        &mut self,
        locator: &Locator,
        top_left: CellRef,
        rows: &[Vec<Option<Cell>>],
    ) -> Result<()> {
        paste(self.grid_mut(locator)?, top_left, rows);
        Ok(())
    }

    fn batch_update(&mut self, locator: &Locator, updates: &[RangeUpdate]) -> Result<()> {
        let grid = self.grid_mut(locator)?;
        for update in updates {
            paste_update(grid, update)?;
        }
        Ok(())
    }

    fn append_rows(&mut self, locator: &Locator, rows: &[Vec<Cell>]) -> Result<()> {
        append(self.grid_mut(locator)?, rows);
        Ok(())
    }

    fn clear_and_resize(
        &mut self,
        locator: &Locator,
        _min_rows: usize,
        _min_cols: usize,
    ) -> Result<()> {
        self.tabs.insert(locator.clone(), Vec::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tab_is_an_error() {
        let store = MemoryStore::new();
        let err = store.read_table(&Locator::new("s", "t")).unwrap_err();
        assert!(err.to_string().contains("s#t"));
    }

    #[test]
    fn test_clear_creates_tab_and_lists_it() {
        let mut store = MemoryStore::new();
        let loc = Locator::new("s", "DB");
        store.clear_and_resize(&loc, 10, 5).unwrap();
        store
            .write_range(&loc, CellRef::origin(), &[vec![Some(Cell::text("Date"))]])
            .unwrap();
        assert_eq!(store.list_tabs("s").unwrap(), vec!["DB"]);
        assert_eq!(store.read_table(&loc).unwrap().header, vec!["Date"]);
        assert!(store.list_tabs("other").unwrap().is_empty());
    }
}
