use std::fmt;

use tracing::{debug, warn};

use crate::models::{FoodLogEntry, FoodReferenceRow, Macros, NutritionSource, ResolvedNutrition};
use crate::normalize::{is_yes, parse_sheet_date};
use crate::table::Cell;

/// Why a food-log row produced no nutrition.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingValue,
    InvalidValue(String),
    NoMatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingValue => f.write_str("no value"),
            SkipReason::InvalidValue(v) => write!(f, "invalid number '{v}'"),
            SkipReason::NoMatch => f.write_str("no match"),
        }
    }
}

/// Outcome of resolving one food-log row.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Macros typed in by hand; nothing to write back.
    Manual(ResolvedNutrition),
    /// Macros computed from the reference table.
    Computed(ResolvedNutrition),
    Skipped(SkipReason),
}

impl Resolution {
    #[must_use]
    pub fn record(&self) -> Option<&ResolvedNutrition> {
        match self {
            Resolution::Manual(r) | Resolution::Computed(r) => Some(r),
            Resolution::Skipped(_) => None,
        }
    }

    /// Values for the food log's nutrition columns; `None` is a placeholder
    /// that leaves the row untouched.
    #[must_use]
    pub fn write_back(&self) -> Option<Macros> {
        match self {
            Resolution::Computed(r) => Some(r.macros),
            Resolution::Manual(_) | Resolution::Skipped(_) => None,
        }
    }
}

/// Result of resolving a whole food log.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLog {
    /// Manual and computed entries, in log order.
    pub records: Vec<ResolvedNutrition>,
    /// Exactly one slot per food-log row.
    pub write_back: Vec<Option<Macros>>,
    pub computed: usize,
    pub manual: usize,
    pub skipped: usize,
}

/// Matches food-log entries against the reference nutrition table.
pub struct FoodResolver {
    reference: Vec<FoodReferenceRow>,
}

impl FoodResolver {
    #[must_use]
    pub fn new(reference: Vec<FoodReferenceRow>) -> Self {
        Self { reference }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// First reference row whose name or alias equals `food`, ignoring case
    /// and surrounding whitespace.
    #[must_use]
    pub fn lookup(&self, food: &str) -> Option<&FoodReferenceRow> {
        let key = food.trim().to_lowercase();
        self.reference.iter().find(|row| row.matches(&key))
    }

    pub fn resolve(&self, entry: &FoodLogEntry) -> Resolution {
        let raw_date = entry.date.as_text();
        let date = parse_sheet_date(&entry.date);
        let food = entry.food_name.trim().to_lowercase();

        let blank_row = entry.raw_value.trim().is_empty() && entry.manual_input.trim().is_empty();
        if is_yes(&entry.manual_input) || blank_row {
            return Resolution::Manual(ResolvedNutrition {
                row_number: entry.row_number,
                date,
                raw_date,
                macros: Macros::new(
                    manual_field(&entry.manual.kcal, "kcal", entry),
                    manual_field(&entry.manual.protein, "protein", entry),
                    manual_field(&entry.manual.carb, "carb", entry),
                    manual_field(&entry.manual.fat, "fat", entry),
                ),
                source: NutritionSource::Manual,
            });
        }

        let value_str = entry.raw_value.trim();
        if value_str.is_empty() {
            warn!(food = %food, date = %raw_date, row = entry.row_number, "skipping: no value");
            return Resolution::Skipped(SkipReason::MissingValue);
        }

        let Some(mut value) = value_str.parse::<f64>().ok().filter(|v| v.is_finite()) else {
            warn!(food = %food, date = %raw_date, row = entry.row_number, value = value_str, "skipping: invalid number");
            return Resolution::Skipped(SkipReason::InvalidValue(value_str.to_string()));
        };

        let conversion = entry.raw_conversion.trim();
        if !conversion.is_empty() {
            match conversion.parse::<f64>() {
                Ok(factor) if factor.is_finite() => value *= factor,
                _ => {
                    warn!(food = %food, date = %raw_date, conversion, "invalid conversion factor, ignoring");
                }
            }
        }

        let Some(reference) = self.lookup(&food) else {
            warn!(food = %food, date = %raw_date, row = entry.row_number, "no match found, check name or alias");
            return Resolution::Skipped(SkipReason::NoMatch);
        };

        let factor = value / reference.per_unit;
        Resolution::Computed(ResolvedNutrition {
            row_number: entry.row_number,
            date,
            raw_date,
            macros: reference.per_unit_macros.scaled(factor),
            source: NutritionSource::Computed,
        })
    }

    /// Resolve every entry. The write-back list always has one slot per entry.
    pub fn resolve_log(&self, entries: &[FoodLogEntry]) -> ResolvedLog {
        let mut log = ResolvedLog {
            write_back: Vec::with_capacity(entries.len()),
            ..ResolvedLog::default()
        };

        for entry in entries {
            let resolution = self.resolve(entry);
            match &resolution {
                Resolution::Manual(_) => log.manual += 1,
                Resolution::Computed(_) => log.computed += 1,
                Resolution::Skipped(_) => log.skipped += 1,
            }
            log.write_back.push(resolution.write_back());
            if let Some(record) = resolution.record() {
                log.records.push(record.clone());
            }
        }

        debug!(
            rows = entries.len(),
            computed = log.computed,
            manual = log.manual,
            skipped = log.skipped,
            "resolved food log"
        );
        log
    }
}

fn manual_field(cell: &Cell, field: &str, entry: &FoodLogEntry) -> f64 {
    if cell.is_blank() {
        return 0.0;
    }
    cell.as_f64().unwrap_or_else(|| {
        warn!(
            food = %entry.food_name,
            date = %entry.date,
            row = entry.row_number,
            field,
            value = %cell,
            "unreadable manual value, using 0"
        );
        0.0
    })
}
