//! The tactical reporting table: master rows joined with the activity log,
//! plus cycle and sleep fields derived from them.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::cycle::{CycleInput, CyclePhaseDeriver};
use crate::decode::{decode_activity, decode_master};
use crate::models::{ActivityRow, MasterRow, columns};
use crate::normalize::{
    bedtime_quality, categorise_poop_time, clean_steps, format_clock, format_sheet_date,
    normalise_bedtime, normalise_load_bearing, parse_clock_time, sleep_duration,
};
use crate::table::{Cell, Table};

/// Derived columns appended when the sources don't already have them.
const DERIVED_COLUMNS: [&str; 8] = [
    columns::PHASE,
    columns::CYCLE_NO,
    columns::PHASE_ID,
    columns::CYCLE_DAY,
    columns::BEDTIME_CLEAN,
    columns::SLEEP_DURATION,
    columns::POOP_TIME,
    columns::INCLUDE_RECENT,
];

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One master row and the activity row logged on the same date.
struct JoinedRow<'a> {
    master: &'a MasterRow,
    master_cells: &'a [Cell],
    activity: Option<(&'a ActivityRow, &'a [Cell])>,
}

impl JoinedRow<'_> {
    fn date(&self) -> Option<NaiveDate> {
        self.master.date
    }

    fn wake_up(&self) -> Option<chrono::NaiveDateTime> {
        let (activity, _) = self.activity?;
        let time = parse_clock_time(&activity.wake_up)?;
        Some(self.date()?.and_time(time))
    }

    fn bedtime(&self) -> Option<chrono::NaiveTime> {
        self.activity.and_then(|(a, _)| normalise_bedtime(&a.bedtime))
    }
}

pub struct TacticalBuilder {
    deriver: CyclePhaseDeriver,
    cycles_to_display: u32,
}

impl TacticalBuilder {
    #[must_use]
    pub fn new(cycle_offset: u32, cycles_to_display: u32) -> Self {
        Self {
            deriver: CyclePhaseDeriver::new(cycle_offset),
            cycles_to_display,
        }
    }

    fn header(master: &Table, activity: &Table) -> Vec<String> {
        let mut header: Vec<String> = master
            .header
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty() && key(h) != key(columns::ID))
            .collect();
        let extra: Vec<String> = activity
            .header
            .iter()
            .map(|h| h.trim().to_string())
            .chain(DERIVED_COLUMNS.iter().map(ToString::to_string))
            .collect();
        for name in extra {
            if !name.is_empty() && !header.iter().any(|h| key(h) == key(&name)) {
                header.push(name);
            }
        }
        header
    }

    /// Build the full output table. Reads nothing and writes nothing.
    pub fn build(&self, master: &Table, activity: &Table) -> Result<Table> {
        let mut master = master.clone();
        master.drop_blank_rows();
        let mut activity = activity.clone();
        activity.drop_blank_rows();

        let master_rows = decode_master(&master)?;
        let activity_rows = decode_activity(&activity)?;

        let mut by_date: HashMap<NaiveDate, usize> = HashMap::new();
        for (i, row) in activity_rows.iter().enumerate() {
            let Some(date) = row.date else { continue };
            if by_date.contains_key(&date) {
                warn!(date = %format_sheet_date(date), "duplicate date in activity log, using first row");
                continue;
            }
            by_date.insert(date, i);
        }

        let mut joined: Vec<JoinedRow<'_>> = master_rows
            .iter()
            .zip(&master.rows)
            .map(|(row, cells)| JoinedRow {
                master: row,
                master_cells: cells,
                activity: row
                    .date
                    .and_then(|d| by_date.get(&d))
                    .map(|&i| (&activity_rows[i], activity.rows[i].as_slice())),
            })
            .collect();
        joined.sort_by_key(|r| (r.date().is_none(), r.date()));

        let inputs: Vec<CycleInput> = joined
            .iter()
            .map(|r| CycleInput {
                menstruation: r.activity.is_some_and(|(a, _)| a.menstruating()),
                recorded_phase: r.activity.and_then(|(a, _)| a.phase),
            })
            .collect();
        let cycle = self.deriver.derive(&inputs);
        let max_cycle = cycle.iter().map(|c| c.cycle_number).max().unwrap_or(0);

        let header = Self::header(&master, &activity);
        let mut out = Table::new(header);

        for (i, row) in joined.iter().enumerate() {
            let mut values: HashMap<String, Cell> = HashMap::new();
            if let Some((_, cells)) = row.activity {
                for (name, cell) in activity.header.iter().zip(cells) {
                    values.insert(key(name), cell.clone());
                }
            }
            for (name, cell) in master.header.iter().zip(row.master_cells) {
                values.insert(key(name), cell.clone());
            }

            if let Some(date) = row.date() {
                values.insert(key(columns::DATE), Cell::text(format_sheet_date(date)));
            }

            if let Some((activity_row, _)) = row.activity {
                let steps = match clean_steps(&activity_row.steps) {
                    Some(n) => Cell::Number(f64::from(n)),
                    None => Cell::text(activity_row.steps.clone()),
                };
                values.insert(key(columns::STEPS), steps);
                values.insert(
                    key(columns::LOAD_BEARING),
                    Cell::text(normalise_load_bearing(&activity_row.load_bearing)),
                );
                values.insert(
                    key(columns::WAKE_UP),
                    parse_clock_time(&activity_row.wake_up)
                        .map_or(Cell::Empty, |t| Cell::text(format_clock(t))),
                );
            }

            let bedtime = row.bedtime();
            values.insert(
                key(columns::BEDTIME),
                bedtime.map_or(Cell::Empty, |t| Cell::text(format_clock(t))),
            );
            values.insert(
                key(columns::BEDTIME_CLEAN),
                Cell::text(bedtime_quality(bedtime).label()),
            );

            let next_wake = joined.get(i + 1).and_then(JoinedRow::wake_up);
            let bed_at = row.date().zip(bedtime).map(|(d, t)| d.and_time(t));
            values.insert(
                key(columns::SLEEP_DURATION),
                sleep_duration(bed_at, next_wake).map_or(Cell::Empty, Cell::Number),
            );

            let poop = row
                .activity
                .and_then(|(a, _)| categorise_poop_time(&a.poop_time));
            values.insert(
                key(columns::POOP_TIME),
                poop.map_or(Cell::Empty, |p| Cell::text(p.as_str())),
            );

            let day = cycle[i];
            values.insert(
                key(columns::PHASE),
                day.phase.map_or(Cell::Empty, |p| Cell::text(p.as_str())),
            );
            values.insert(
                key(columns::PHASE_ID),
                day.phase_id.map_or(Cell::Empty, |id| Cell::Number(f64::from(id))),
            );
            values.insert(key(columns::CYCLE_NO), Cell::Number(f64::from(day.cycle_number)));
            values.insert(key(columns::CYCLE_DAY), Cell::Number(f64::from(day.cycle_day)));
            let recent = u64::from(day.cycle_number) + u64::from(self.cycles_to_display)
                > u64::from(max_cycle);
            values.insert(
                key(columns::INCLUDE_RECENT),
                Cell::text(if recent { "TRUE" } else { "FALSE" }),
            );

            let line = out
                .header
                .iter()
                .map(|h| match values.remove(&key(h)) {
                    Some(Cell::Text(s)) if s.trim() == "-" => Cell::Empty,
                    Some(cell) => cell,
                    None => Cell::Empty,
                })
                .collect();
            out.rows.push(line);
        }

        debug!(rows = out.len(), columns = out.width(), max_cycle, "built tactical table");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Table {
        Table::from_grid(
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::text(*s)).collect())
                .collect(),
        )
    }

    fn col<'a>(t: &'a Table, row: usize, name: &str) -> &'a Cell {
        t.get(row, t.column(name))
    }

    fn master() -> Table {
        table(&[
            &["ID", "Date", "Kcal", "Weight"],
            &["3", "03/01/2024", "1700", "60.8"],
            &["1", "01/01/2024", "1800", "61.2"],
            &["2", "02/01/2024", "1900", "61.0"],
            &["4", "04/01/2024", "1600", "-"],
        ])
    }

    fn activity() -> Table {
        table(&[
            &["Date", "Menstruation", "Phase", "Steps", "Load-bearing", "Bedtime", "Wake-up time", "💩", "Mood"],
            &["01/01/2024", "", "Luteal", "7.6k steps", "✅", "11", "07:00", "morning", "ok"],
            &["02/01/2024", "Y", "", "5000", "", "1", "08:00", "-", ""],
            &["03/01/2024", "Y", "", "", "hip mobility", "midnight", "07:30", "night", "tired"],
            &["04/01/2024", "", "", "-", "", "", "06:45", "", ""],
        ])
    }

    #[test]
    fn test_header_drops_id_and_appends_derived() {
        let out = TacticalBuilder::new(3, 4).build(&master(), &activity()).unwrap();
        assert_eq!(out.header[..3], ["Date", "Kcal", "Weight"]);
        assert!(out.column("ID").is_none());
        assert!(out.column("Mood").is_some());
        assert!(out.column("Include_Last4").is_some());
        assert_eq!(out.header.iter().filter(|h| *h == "Phase").count(), 1);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_rows_sorted_and_passthrough_kept() {
        let out = TacticalBuilder::new(3, 4).build(&master(), &activity()).unwrap();
        assert_eq!(col(&out, 0, "Date").as_text(), "01/01/2024");
        assert_eq!(col(&out, 0, "Weight").as_text(), "61.2");
        assert_eq!(col(&out, 0, "Mood").as_text(), "ok");
        assert!(col(&out, 3, "Weight").is_blank());
    }

    #[test]
    fn test_cycle_fields() {
        let out = TacticalBuilder::new(3, 4).build(&master(), &activity()).unwrap();
        let phases: Vec<String> = (0..4).map(|r| col(&out, r, "Phase").as_text()).collect();
        assert_eq!(phases, ["Luteal", "Menstrual", "Menstrual", "Follicular"]);
        assert_eq!(col(&out, 0, "Cycle No.").as_f64(), Some(3.0));
        assert_eq!(col(&out, 1, "Cycle No.").as_f64(), Some(4.0));
        assert_eq!(col(&out, 2, "Cycle_Day").as_f64(), Some(2.0));
        assert_eq!(col(&out, 3, "Phase_ID").as_f64(), Some(2.0));
        assert_eq!(col(&out, 0, "Include_Last4").as_text(), "TRUE");

        let narrow = TacticalBuilder::new(3, 1).build(&master(), &activity()).unwrap();
        assert_eq!(col(&narrow, 0, "Include_Last4").as_text(), "FALSE");
        assert_eq!(col(&narrow, 1, "Include_Last4").as_text(), "TRUE");
    }

    #[test]
    fn test_large_cycle_settings_do_not_overflow() {
        let out = TacticalBuilder::new(u32::MAX, u32::MAX)
            .build(&master(), &activity())
            .unwrap();
        assert_eq!(col(&out, 1, "Cycle No.").as_f64(), Some(f64::from(u32::MAX)));
        assert!((0..out.len()).all(|r| col(&out, r, "Include_Last4").as_text() == "TRUE"));
    }

    #[test]
    fn test_normalised_columns() {
        let out = TacticalBuilder::new(3, 4).build(&master(), &activity()).unwrap();
        assert_eq!(col(&out, 0, "Steps").as_f64(), Some(7600.0));
        assert!(col(&out, 3, "Steps").is_blank());
        assert_eq!(col(&out, 0, "Load-bearing").as_text(), "Y");
        assert_eq!(col(&out, 2, "Load-bearing").as_text(), "Y");
        assert_eq!(col(&out, 0, "Bedtime").as_text(), "23:00");
        assert_eq!(col(&out, 0, "Bedtime_clean").as_text(), "OK");
        assert_eq!(col(&out, 1, "Bedtime_clean").as_text(), "Not OK");
        assert_eq!(col(&out, 3, "Bedtime_clean").as_text(), "No Data");
        assert_eq!(col(&out, 0, "Poop_time").as_text(), "morning");
        assert!(col(&out, 1, "Poop_time").is_blank());
        assert!(col(&out, 1, "💩").is_blank());
        assert_eq!(col(&out, 2, "Poop_time").as_text(), "evening");
    }

    #[test]
    fn test_sleep_duration_across_midnight() {
        let out = TacticalBuilder::new(3, 4).build(&master(), &activity()).unwrap();
        // 23:00 on the 1st to 08:00 on the 2nd
        assert_eq!(col(&out, 0, "Sleep_duration").as_f64(), Some(9.0));
        // 01:00 logged on the 2nd is early on the 3rd, wake 07:30
        assert_eq!(col(&out, 1, "Sleep_duration").as_f64(), Some(6.5));
        assert_eq!(col(&out, 2, "Sleep_duration").as_f64(), Some(6.8));
        assert!(col(&out, 3, "Sleep_duration").is_blank());
    }

    #[test]
    fn test_master_row_without_activity() {
        let master = table(&[&["Date", "Kcal"], &["05/01/2024", "1500"], &["", "100"]]);
        let out = TacticalBuilder::new(3, 4).build(&master, &activity()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(col(&out, 0, "Cycle No.").as_f64(), Some(3.0));
        assert!(col(&out, 0, "Phase").is_blank());
        assert_eq!(col(&out, 1, "Kcal").as_text(), "100");
    }
}
