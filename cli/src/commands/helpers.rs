use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use healthsync_core::table::Table as SheetTable;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Render the last `limit` rows of a sheet table.
pub(crate) fn render_preview(table: &SheetTable, limit: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.header.iter().map(|h| truncate(h, 16)));
    let skip = table.len().saturating_sub(limit);
    for row in table.rows.iter().skip(skip) {
        builder.push_record(
            (0..table.width()).map(|i| row.get(i).map(|c| truncate(&c.as_text(), 16)).unwrap_or_default()),
        );
    }
    builder.build().with(Style::rounded()).to_string()
}

pub(crate) fn dry_run_note(dry_run: bool) {
    if dry_run {
        println!("Dry run: nothing was written.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthsync_core::table::Cell;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }

    #[test]
    fn test_render_preview_keeps_last_rows() {
        let mut table = SheetTable::new(vec!["Date".into(), "Kcal".into()]);
        for (d, k) in [("01/01/2024", 1800.0), ("02/01/2024", 1900.0), ("03/01/2024", 2000.0)] {
            table.rows.push(vec![Cell::text(d), Cell::Number(k)]);
        }
        let out = render_preview(&table, 2);
        assert!(!out.contains("01/01/2024"));
        assert!(out.contains("02/01/2024"));
        assert!(out.contains("2000"));
        assert!(out.contains("Kcal"));
    }
}
