use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::Serialize;

/// One spreadsheet cell as seen by the core.
///
/// Readers may hand back numbers already coerced or keep the raw text; every
/// decoder goes through [`Cell::as_f64`] / [`Cell::as_text`] so both work.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
    /// Build a text cell, collapsing the empty string to [`Cell::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Cell::Empty } else { Cell::Text(s) }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed text rendering. Numbers render without a trailing `.0`.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::text(s)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::text(s)
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Cells of one row keyed by (trimmed) header name.
pub type Record = BTreeMap<String, Cell>;

/// Case-insensitive, whitespace-tolerant header lookup.
#[must_use]
pub fn column_index(header: &[String], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}

/// A tab read in full: the first sheet row is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    #[must_use]
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Split a raw grid into header and rows. Trailing blank rows are dropped,
    /// blank rows in the middle are kept so sheet row numbers stay aligned.
    #[must_use]
    pub fn from_grid(mut grid: Vec<Vec<Cell>>) -> Self {
        while grid
            .last()
            .is_some_and(|row| row.iter().all(Cell::is_blank))
        {
            grid.pop();
        }
        if grid.is_empty() {
            return Self::default();
        }
        let header = grid
            .remove(0)
            .iter()
            .map(|c| c.as_text())
            .collect::<Vec<_>>();
        Self { header, rows: grid }
    }

    /// Header followed by every row, as it would be pasted at `A1`.
    #[must_use]
    pub fn to_grid(&self) -> Vec<Vec<Cell>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.header.iter().map(|h| Cell::text(h.clone())).collect());
        grid.extend(self.rows.iter().cloned());
        grid
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.header.len()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        column_index(&self.header, name)
    }

    /// First header matching any of `names`, in the order given.
    #[must_use]
    pub fn column_any(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.column(n))
    }

    /// Cell at `row`/`col`; out-of-range or unknown columns read as empty.
    #[must_use]
    pub fn get(&self, row: usize, col: Option<usize>) -> &Cell {
        col.and_then(|c| self.rows.get(row).and_then(|r| r.get(c)))
            .unwrap_or(&EMPTY)
    }

    /// Every column of `row` except the `skip` indexes, keyed by header.
    #[must_use]
    pub fn record(&self, row: usize, skip: &[usize]) -> Record {
        self.header
            .iter()
            .enumerate()
            .filter(|(i, h)| !skip.contains(i) && !h.trim().is_empty())
            .map(|(i, h)| (h.trim().to_string(), self.get(row, Some(i)).clone()))
            .collect()
    }

    pub fn drop_blank_rows(&mut self) {
        self.rows.retain(|row| !row.iter().all(Cell::is_blank));
    }

    /// Remove columns whose every data cell is blank.
    pub fn drop_blank_columns(&mut self) {
        let keep: Vec<usize> = (0..self.header.len())
            .filter(|&c| {
                (0..self.rows.len()).any(|r| !self.get(r, Some(c)).is_blank())
            })
            .collect();
        self.header = keep.iter().map(|&c| self.header[c].clone()).collect();
        self.rows = self
            .rows
            .iter()
            .map(|row| {
                keep.iter()
                    .map(|&c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
    }
}

/// Where a table lives: a spreadsheet identifier and a tab title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Locator {
    pub spreadsheet: String,
    pub tab: String,
}

impl Locator {
    pub fn new(spreadsheet: impl Into<String>, tab: impl Into<String>) -> Self {
        Self {
            spreadsheet: spreadsheet.into(),
            tab: tab.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.spreadsheet, self.tab)
    }
}

/// 1-based A1-style cell reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    #[must_use]
    pub fn origin() -> Self {
        Self { row: 1, col: 1 }
    }
}

/// `1 -> "A"`, `27 -> "AA"`.
#[must_use]
pub fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// `"A" -> 1`, `"aa" -> 27`. `None` for anything but ASCII letters.
#[must_use]
pub fn column_number(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters.to_ascii_uppercase().bytes().try_fold(0usize, |acc, b| {
        acc.checked_mul(26)?
            .checked_add(usize::from(b - b'A') + 1)
    })
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .with_context(|| format!("Invalid cell reference: '{s}'"))?;
        let (letters, digits) = s.split_at(split);
        let col = column_number(letters)
            .with_context(|| format!("Invalid column in cell reference: '{s}'"))?;
        let row: usize = digits
            .parse()
            .with_context(|| format!("Invalid row in cell reference: '{s}'"))?;
        if row == 0 {
            bail!("Row numbers start at 1: '{s}'");
        }
        Ok(CellRef { row, col })
    }
}

/// Inclusive rectangular range such as `G2:J10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    #[must_use]
    pub fn single(cell: CellRef) -> Self {
        Self {
            start: cell,
            end: cell,
        }
    }

    /// Range covering `rows` x `cols` cells from `start`.
    #[must_use]
    pub fn spanning(start: CellRef, rows: usize, cols: usize) -> Self {
        Self {
            start,
            end: CellRef::new(
                start.row + rows.max(1) - 1,
                start.col + cols.max(1) - 1,
            ),
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.end.col - self.start.col + 1
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for CellRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            None => Ok(CellRange::single(s.parse()?)),
            Some((a, b)) => {
                let start: CellRef = a.parse()?;
                let end: CellRef = b.parse()?;
                if end.row < start.row || end.col < start.col {
                    bail!("Range end precedes start: '{s}'");
                }
                Ok(CellRange { start, end })
            }
        }
    }
}

/// One disjoint block of a batched write.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeUpdate {
    pub range: CellRange,
    pub values: Vec<Vec<Cell>>,
}

/// Read side of the remote tabular store.
pub trait TableReader {
    /// The whole tab, first row as header, cells in column order.
    fn read_table(&self, locator: &Locator) -> Result<Table>;

    /// Tab titles of one spreadsheet.
    fn list_tabs(&self, spreadsheet: &str) -> Result<Vec<String>>;
}

/// Write side of the remote tabular store.
///
/// Each call is self-contained; nothing is transactional across calls.
pub trait TableWriter {
    /// Overwrite a block starting at `top_left`. A `None` leaves that cell as is.
    fn write_range(
        &mut self,
        locator: &Locator,
        top_left: CellRef,
        rows: &[Vec<Option<Cell>>],
    ) -> Result<()>;

    /// Apply several disjoint range writes in one request.
    fn batch_update(&mut self, locator: &Locator, updates: &[RangeUpdate]) -> Result<()>;

    /// Append rows after the last non-blank row.
    fn append_rows(&mut self, locator: &Locator, rows: &[Vec<Cell>]) -> Result<()>;

    /// Make sure the tab exists and is empty.
    fn clear_and_resize(&mut self, locator: &Locator, min_rows: usize, min_cols: usize)
    -> Result<()>;
}

/// Paste `rows` into `grid` at `top_left`, growing the grid as needed.
pub(crate) fn paste(grid: &mut Vec<Vec<Cell>>, top_left: CellRef, rows: &[Vec<Option<Cell>>]) {
    for (r, row) in rows.iter().enumerate() {
        let target_row = top_left.row - 1 + r;
        if grid.len() <= target_row {
            grid.resize_with(target_row + 1, Vec::new);
        }
        let line = &mut grid[target_row];
        for (c, cell) in row.iter().enumerate() {
            let Some(cell) = cell else { continue };
            let target_col = top_left.col - 1 + c;
            if line.len() <= target_col {
                line.resize(target_col + 1, Cell::Empty);
            }
            line[target_col] = cell.clone();
        }
    }
}

/// Apply one batched range write to `grid`, rejecting blocks larger than their range.
pub(crate) fn paste_update(grid: &mut Vec<Vec<Cell>>, update: &RangeUpdate) -> Result<()> {
    let range = update.range;
    if update.values.len() > range.rows()
        || update.values.iter().any(|row| row.len() > range.cols())
    {
        bail!("Values do not fit range {range}");
    }
    let rows: Vec<Vec<Option<Cell>>> = update
        .values
        .iter()
        .map(|row| row.iter().cloned().map(Some).collect())
        .collect();
    paste(grid, range.start, &rows);
    Ok(())
}

/// Append after the last row holding any data.
pub(crate) fn append(grid: &mut Vec<Vec<Cell>>, rows: &[Vec<Cell>]) {
    while grid
        .last()
        .is_some_and(|row| row.iter().all(Cell::is_blank))
    {
        grid.pop();
    }
    grid.extend(rows.iter().cloned());
}

/// Clear `locator` and write `table` at `A1`, header included.
pub fn replace_tab<W: TableWriter + ?Sized>(
    writer: &mut W,
    locator: &Locator,
    table: &Table,
) -> Result<()> {
    writer
        .clear_and_resize(locator, table.len() + 10, table.width() + 2)
        .with_context(|| format!("Failed to clear {locator}"))?;
    let rows: Vec<Vec<Option<Cell>>> = table
        .to_grid()
        .into_iter()
        .map(|row| row.into_iter().map(Some).collect())
        .collect();
    writer
        .write_range(locator, CellRef::origin(), &rows)
        .with_context(|| format!("Failed to write {locator}"))
}
