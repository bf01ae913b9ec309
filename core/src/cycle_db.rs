//! Union of every `Cycle N` tab of the cycle tracker into one flat table.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::normalize::{
    categorise_poop_time, clean_steps, format_clock, format_sheet_date, normalise_bedtime,
    parse_sheet_date,
};
use crate::table::{Cell, Locator, Record, Table, TableReader};

static CYCLE_TAB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^cycle\s*0*\d+\s*$").expect("cycle tab pattern is valid")
});

pub const OUTPUT_COLUMNS: [&str; 13] = [
    "Date",
    "Cycle No.",
    "Day_clean",
    "Phase",
    "Calories",
    "Protein (g)",
    "Carbs (g)",
    "Fat (g)",
    "NEAT_clean",
    "Load-bearing",
    "Bedtime_clean",
    "Poop_time",
    "Mood_Notes",
];

const DAY_SOURCES: [&str; 2] = ["Cycle Day", "Day"];
const NEAT_SOURCES: [&str; 3] = ["NEAT / Walk", "NEAT_Walk", "NEAT"];
const MOOD_SOURCES: [&str; 2] = ["Mood / Notes", "Mood_Notes"];
const COPIED: [&str; 6] = ["Phase", "Calories", "Protein (g)", "Carbs (g)", "Fat (g)", "Load-bearing"];

/// `Cycle 4`, `cycle5`, `CYCLE 07`.
#[must_use]
pub fn is_cycle_tab(title: &str) -> bool {
    CYCLE_TAB_RE.is_match(title.trim())
}

/// Combined table and the tabs it was built from.
#[derive(Debug, Clone)]
pub struct CycleDb {
    pub table: Table,
    pub tabs: Vec<String>,
}

struct TaggedRow {
    tab: String,
    cells: Record,
}

impl TaggedRow {
    fn get(&self, name: &str) -> Option<&Cell> {
        self.cells.get(name)
    }
}

/// Read every cycle tab of `spreadsheet` and combine them.
pub fn build_cycle_db<R: TableReader + ?Sized>(reader: &R, spreadsheet: &str) -> Result<CycleDb> {
    let tabs: Vec<String> = reader
        .list_tabs(spreadsheet)
        .with_context(|| format!("Failed to list tabs of {spreadsheet}"))?
        .into_iter()
        .filter(|t| is_cycle_tab(t))
        .collect();
    if tabs.is_empty() {
        bail!("No tabs matching 'Cycle N' found in {spreadsheet}");
    }

    let mut sources = Vec::with_capacity(tabs.len());
    for tab in &tabs {
        let locator = Locator::new(spreadsheet, tab.clone());
        let table = reader.read_table(&locator)?;
        debug!(tab = %tab, rows = table.len(), "read cycle tab");
        sources.push((tab.trim().to_string(), table));
    }

    let table = combine_cycle_tabs(sources);
    info!(tabs = tabs.len(), rows = table.len(), "combined cycle tabs");
    Ok(CycleDb { table, tabs })
}

/// First of `candidates` present in any tab.
fn pick<'a>(present: &HashSet<String>, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| present.contains(*c))
}

#[allow(clippy::cast_possible_truncation)]
fn whole_day(cell: Option<&Cell>) -> Option<i64> {
    let v = cell?.as_f64()?;
    (v.fract() == 0.0).then_some(v as i64)
}

/// Union tabs by column name and derive the cleaned output columns.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn combine_cycle_tabs(tabs: Vec<(String, Table)>) -> Table {
    let mut rows = Vec::new();
    let mut present = HashSet::new();
    for (title, mut table) in tabs {
        table.drop_blank_rows();
        table.drop_blank_columns();
        present.extend(table.header.iter().map(|h| h.trim().to_string()));
        for i in 0..table.len() {
            rows.push(TaggedRow {
                tab: title.clone(),
                cells: table.record(i, &[]),
            });
        }
    }

    let day_col = pick(&present, &DAY_SOURCES);
    let neat_col = pick(&present, &NEAT_SOURCES);
    let mood_col = pick(&present, &MOOD_SOURCES);

    let mut keyed: Vec<(Option<NaiveDate>, Option<i64>, TaggedRow)> = rows
        .into_iter()
        .map(|row| {
            let date = row.get("Date").and_then(parse_sheet_date);
            let day = day_col.and_then(|c| whole_day(row.get(c)));
            (date, day, row)
        })
        .collect();
    keyed.sort_by(|a, b| {
        (a.0.is_none(), a.0, a.1.is_none(), a.1, &a.2.tab)
            .cmp(&(b.0.is_none(), b.0, b.1.is_none(), b.1, &b.2.tab))
    });

    let mut out = Table::new(OUTPUT_COLUMNS.iter().map(ToString::to_string).collect());
    for (date, day, row) in keyed {
        let text = |name: Option<&str>| -> String {
            name.and_then(|n| row.get(n)).map(Cell::as_text).unwrap_or_default()
        };
        let copied = |name: &str| row.get(name).cloned().unwrap_or_default();

        let mut line = vec![
            date.map_or(Cell::Empty, |d| Cell::text(format_sheet_date(d))),
            Cell::text(row.tab.clone()),
            day.map_or(Cell::Empty, |d| Cell::Number(d as f64)),
        ];
        line.extend(COPIED[..5].iter().map(|c| copied(*c)));
        line.push(
            clean_steps(&text(neat_col)).map_or(Cell::Empty, |n| Cell::Number(f64::from(n))),
        );
        line.push(copied(COPIED[5]));
        line.push(
            normalise_bedtime(&text(Some("Bedtime")))
                .map_or(Cell::Empty, |t| Cell::text(format_clock(t))),
        );
        line.push(
            categorise_poop_time(&text(Some("💩")))
                .map_or(Cell::Empty, |p| Cell::text(p.as_str())),
        );
        line.push(Cell::text(text(mood_col)));
        out.rows.push(line);
    }
    out
}
