//! Typed decoding of raw tabs into the records the pipelines work on.
//!
//! Required columns are checked up front; per-cell problems are logged and
//! degrade that one field.

use anyhow::{Result, bail};
use tracing::warn;

use crate::models::{
    ActivityRow, FoodLogEntry, FoodReferenceRow, Macros, ManualMacros, MasterRow, Phase, columns,
};
use crate::normalize::parse_sheet_date;
use crate::table::{Cell, Table};

/// Header row plus 1-based sheet numbering.
const FIRST_DATA_ROW: usize = 2;

fn require_columns(table: &Table, what: &str, required: &[&str]) -> Result<()> {
    for name in required {
        if table.column(name).is_none() {
            bail!("Missing required column in {what}: {name}");
        }
    }
    Ok(())
}

fn lowercase_key(cell: &Cell) -> String {
    cell.as_text().to_lowercase()
}

/// Parse the reference nutrition table.
///
/// Rows without a usable, nonzero `Per Unit` cannot scale anything and are
/// dropped with a warning. Blank macro cells count as zero.
pub fn decode_reference(table: &Table) -> Result<Vec<FoodReferenceRow>> {
    use columns::{ALIAS, FOOD, PER_UNIT, REF_CARB, REF_FAT, REF_KCAL, REF_PROTEIN};

    require_columns(
        table,
        "reference table",
        &[FOOD, PER_UNIT, REF_KCAL, REF_PROTEIN, REF_CARB, REF_FAT],
    )?;

    let idx_food = table.column(FOOD);
    let idx_alias = table.column(ALIAS);
    let idx_per_unit = table.column(PER_UNIT);
    let idx_kcal = table.column(REF_KCAL);
    let idx_protein = table.column(REF_PROTEIN);
    let idx_carb = table.column(REF_CARB);
    let idx_fat = table.column(REF_FAT);

    let mut rows = Vec::new();
    for i in 0..table.len() {
        let name = lowercase_key(table.get(i, idx_food));
        if name.is_empty() {
            continue;
        }

        let per_unit = match table.get(i, idx_per_unit).as_f64() {
            Some(v) if v != 0.0 => v,
            _ => {
                warn!(food = %name, row = i + FIRST_DATA_ROW, "reference row has no usable Per Unit, ignoring");
                continue;
            }
        };

        let macro_field = |idx: Option<usize>, column: &str| -> f64 {
            let cell = table.get(i, idx);
            cell.as_f64().unwrap_or_else(|| {
                if !cell.is_blank() {
                    warn!(food = %name, column, value = %cell, "unreadable reference value, using 0");
                }
                0.0
            })
        };

        let alias = lowercase_key(table.get(i, idx_alias));
        rows.push(FoodReferenceRow {
            per_unit,
            per_unit_macros: Macros::new(
                macro_field(idx_kcal, REF_KCAL),
                macro_field(idx_protein, REF_PROTEIN),
                macro_field(idx_carb, REF_CARB),
                macro_field(idx_fat, REF_FAT),
            ),
            alias: (!alias.is_empty()).then_some(alias),
            name,
        });
    }

    Ok(rows)
}

/// One entry per table row, blank rows included, so row numbers line up
/// with the sheet for the write-back.
pub fn decode_food_log(table: &Table) -> Result<Vec<FoodLogEntry>> {
    use columns::{
        CONVERSION, DATE, FOOD, LOG_CARB, LOG_FAT, LOG_KCAL, LOG_PROTEIN, MANUAL_INPUT, VALUE,
    };

    require_columns(table, "food log", &[DATE, FOOD, MANUAL_INPUT, VALUE])?;

    let idx_date = table.column(DATE);
    let idx_food = table.column(FOOD);
    let idx_manual = table.column(MANUAL_INPUT);
    let idx_value = table.column(VALUE);
    let idx_conversion = table.column(CONVERSION);
    let idx_kcal = table.column(LOG_KCAL);
    let idx_protein = table.column(LOG_PROTEIN);
    let idx_carb = table.column(LOG_CARB);
    let idx_fat = table.column(LOG_FAT);

    Ok((0..table.len())
        .map(|i| FoodLogEntry {
            row_number: i + FIRST_DATA_ROW,
            date: table.get(i, idx_date).clone(),
            food_name: lowercase_key(table.get(i, idx_food)),
            manual_input: table.get(i, idx_manual).as_text(),
            raw_value: table.get(i, idx_value).as_text(),
            raw_conversion: table.get(i, idx_conversion).as_text(),
            manual: ManualMacros {
                kcal: table.get(i, idx_kcal).clone(),
                protein: table.get(i, idx_protein).clone(),
                carb: table.get(i, idx_carb).clone(),
                fat: table.get(i, idx_fat).clone(),
            },
        })
        .collect())
}

/// Parse the master table. Macro columns are optional; a missing column just
/// reads as blank.
pub fn decode_master(table: &Table) -> Result<Vec<MasterRow>> {
    use columns::{CARB, DATE, FAT, KCAL, PROTEIN};

    require_columns(table, "master table", &[DATE])?;

    let idx_date = table.column(DATE);
    let idx_kcal = table.column(KCAL);
    let idx_protein = table.column(PROTEIN);
    let idx_carb = table.column(CARB);
    let idx_fat = table.column(FAT);
    let keyed: Vec<usize> = [idx_date, idx_kcal, idx_protein, idx_carb, idx_fat]
        .into_iter()
        .flatten()
        .collect();

    Ok((0..table.len())
        .map(|i| MasterRow {
            row_number: i + FIRST_DATA_ROW,
            date: parse_sheet_date(table.get(i, idx_date)),
            kcal: table.get(i, idx_kcal).as_f64(),
            protein_g: table.get(i, idx_protein).as_f64(),
            carb_g: table.get(i, idx_carb).as_f64(),
            fat_g: table.get(i, idx_fat).as_f64(),
            passthrough: table.record(i, &keyed),
        })
        .collect())
}

/// Parse the activity log. Only `Date` is required.
pub fn decode_activity(table: &Table) -> Result<Vec<ActivityRow>> {
    use columns::{BEDTIME, DATE, LOAD_BEARING, MENSTRUATION, NOTES, PHASE, POOP, STEPS, WAKE_UP};

    require_columns(table, "activity log", &[DATE])?;

    let idx_date = table.column(DATE);
    let idx_mens = table.column(MENSTRUATION);
    let idx_phase = table.column(PHASE);
    let idx_steps = table.column(STEPS);
    let idx_load = table.column(LOAD_BEARING);
    let idx_bed = table.column(BEDTIME);
    let idx_wake = table.column(WAKE_UP);
    let idx_poop = table.column_any(&POOP);
    let idx_notes = table.column(NOTES);
    let keyed: Vec<usize> = [
        idx_date, idx_mens, idx_phase, idx_steps, idx_load, idx_bed, idx_wake, idx_poop,
        idx_notes,
    ]
    .into_iter()
    .flatten()
    .collect();

    Ok((0..table.len())
        .map(|i| {
            let phase_cell = table.get(i, idx_phase);
            let phase = if phase_cell.is_blank() {
                None
            } else {
                match phase_cell.as_text().parse::<Phase>() {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!(row = i + FIRST_DATA_ROW, "{e}; treating as blank");
                        None
                    }
                }
            };
            ActivityRow {
                row_number: i + FIRST_DATA_ROW,
                date: parse_sheet_date(table.get(i, idx_date)),
                menstruation: table.get(i, idx_mens).as_text(),
                phase,
                steps: table.get(i, idx_steps).as_text(),
                load_bearing: table.get(i, idx_load).as_text(),
                bedtime: table.get(i, idx_bed).as_text(),
                wake_up: table.get(i, idx_wake).as_text(),
                poop_time: table.get(i, idx_poop).as_text(),
                notes: table.get(i, idx_notes).as_text(),
                passthrough: table.record(i, &keyed),
            }
        })
        .collect())
}
