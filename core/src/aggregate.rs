use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{DailyTotal, Macros, ResolvedNutrition};

/// Group resolved entries by calendar date and sum their macros.
///
/// Output is ordered by date and each field is rounded to one decimal.
/// Entries whose date cannot be parsed are left out.
pub fn aggregate_daily(records: &[ResolvedNutrition]) -> Vec<DailyTotal> {
    let mut days: BTreeMap<NaiveDate, (Macros, usize)> = BTreeMap::new();

    for record in records {
        let Some(date) = record.date else {
            if record.raw_date.is_empty() {
                debug!(row = record.row_number, "entry without date, not aggregated");
            } else {
                warn!(row = record.row_number, date = %record.raw_date, "unparseable date, not aggregated");
            }
            continue;
        };
        let day = days.entry(date).or_default();
        day.0 += record.macros;
        day.1 += 1;
    }

    days.into_iter()
        .map(|(date, (macros, entries))| DailyTotal {
            date,
            macros: macros.rounded(),
            entries,
        })
        .collect()
}
