//! Fail-soft cleaners for hand-typed spreadsheet cells.
//!
//! Every function here is total: an unreadable cell comes back as `None` (or
//! a "no data" label) so one bad cell degrades one field, never the run.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::Serialize;

use crate::table::Cell;

static STEPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)(k)?").expect("steps pattern is valid"));

const MIDNIGHT_ALIASES: [&str; 5] = ["0", "00", "0000", "midnight", "12am"];

/// Bedtimes before this hour belong to the previous evening.
const EARLY_MORNING_CUTOFF: u32 = 6;

/// Round to one decimal place.
#[must_use]
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Round to a whole number.
#[must_use]
pub fn round0(x: f64) -> f64 {
    x.round()
}

/// `"Y"` flags. Only an uppercase `Y` counts; surrounding whitespace is ignored.
#[must_use]
pub fn is_yes(text: &str) -> bool {
    text.trim() == "Y"
}

/// Step counts from free text: `"7.6k steps"`, `"~5k"`, `"(note 5.4k)"`, `"5000"`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn clean_steps(text: &str) -> Option<u32> {
    let s = text.trim().to_lowercase();
    let caps = STEPS_RE.captures(&s)?;
    let num: f64 = caps.get(1)?.as_str().parse().ok()?;
    let scaled = if caps.get(2).is_some() { num * 1000.0 } else { num };
    Some(scaled.round() as u32)
}

/// Bedtime as a 24h clock time.
///
/// Bare hours are read as night-time: `1..=5` stay early morning, `6..=11`
/// become PM, `12..=23` are already 24h.
#[must_use]
pub fn normalise_bedtime(text: &str) -> Option<NaiveTime> {
    let s = text.trim().to_lowercase();

    if MIDNIGHT_ALIASES.contains(&s.as_str()) {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    if s.contains(':') || s.contains("am") || s.contains("pm") {
        return parse_clock_time(&s);
    }

    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        let h: u32 = s.parse().ok()?;
        let hour = match h {
            0 => 0,
            1..=5 | 12..=23 => h,
            6..=11 => h + 12,
            _ => return None,
        };
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }

    None
}

/// `"23:15"`, `"23:15:00"`, `"11pm"`, `"10:30 am"`.
#[must_use]
pub fn parse_clock_time(text: &str) -> Option<NaiveTime> {
    let s = text.trim().to_lowercase();
    let (body, pm) = if let Some(b) = s.strip_suffix("am") {
        (b, Some(false))
    } else if let Some(b) = s.strip_suffix("pm") {
        (b, Some(true))
    } else {
        (s.as_str(), None)
    };

    let mut parts = body.trim().split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 0,
    };

    let hour = match pm {
        None => hour,
        Some(_) if !(1..=12).contains(&hour) => return None,
        Some(true) => hour % 12 + 12,
        Some(false) => hour % 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[must_use]
pub fn format_clock(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoopTime {
    Morning,
    Afternoon,
    Evening,
}

impl PoopTime {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PoopTime::Morning => "morning",
            PoopTime::Afternoon => "afternoon",
            PoopTime::Evening => "evening",
        }
    }
}

impl fmt::Display for PoopTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword match; `"-"` and blanks mean nothing was logged.
#[must_use]
pub fn categorise_poop_time(text: &str) -> Option<PoopTime> {
    let s = text.trim().to_lowercase();
    if s.is_empty() || s == "-" {
        return None;
    }
    if s.contains("morning") {
        Some(PoopTime::Morning)
    } else if s.contains("afternoon") {
        Some(PoopTime::Afternoon)
    } else if ["evening", "night", "midnight"].iter().any(|w| s.contains(w)) {
        Some(PoopTime::Evening)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BedtimeQuality {
    OnTime,
    Late,
    NoData,
}

impl BedtimeQuality {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            BedtimeQuality::OnTime => "OK",
            BedtimeQuality::Late => "Not OK",
            BedtimeQuality::NoData => "No Data",
        }
    }
}

impl fmt::Display for BedtimeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// In bed from 20:00 up to exactly midnight counts as on time.
#[must_use]
pub fn bedtime_quality(bedtime: Option<NaiveTime>) -> BedtimeQuality {
    match bedtime {
        None => BedtimeQuality::NoData,
        Some(t) if t.hour() >= 20 || (t.hour() == 0 && t.minute() == 0) => {
            BedtimeQuality::OnTime
        }
        Some(_) => BedtimeQuality::Late,
    }
}

/// Hours from bedtime to the next wake-up, one decimal.
///
/// A bedtime before 06:00 is moved to the following calendar day, since it
/// was logged on the evening it belongs to.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sleep_duration(
    bedtime: Option<NaiveDateTime>,
    next_wake: Option<NaiveDateTime>,
) -> Option<f64> {
    let mut bed = bedtime?;
    let wake = next_wake?;
    if bed.hour() < EARLY_MORNING_CUTOFF {
        bed += Duration::days(1);
    }
    let seconds = (wake - bed).num_seconds();
    Some(round1(seconds as f64 / 3600.0))
}

/// `✅`, `y` and `hip mobility` all mean a load-bearing session happened.
#[must_use]
pub fn normalise_load_bearing(text: &str) -> String {
    let s = text.trim();
    match s {
        "✅" | "y" | "Y" | "hip mobility" => "Y".to_string(),
        _ => s.to_string(),
    }
}

/// Dates as typed (`dd/mm/YYYY`), ISO, or a spreadsheet serial number.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn parse_sheet_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            if !n.is_finite() || *n < 1.0 {
                return None;
            }
            epoch.checked_add_signed(Duration::try_days(n.trunc() as i64)?)
        }
        Cell::Text(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%d/%m/%Y")
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                .ok()
        }
    }
}

#[must_use]
pub fn format_sheet_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(t: Option<NaiveTime>) -> Option<String> {
        t.map(format_clock)
    }

    fn at(date: &str, time: &str) -> Option<NaiveDateTime> {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        Some(d.and_time(parse_clock_time(time).unwrap()))
    }

    #[test]
    fn test_clean_steps() {
        assert_eq!(clean_steps("7.6k steps"), Some(7600));
        assert_eq!(clean_steps("~5k"), Some(5000));
        assert_eq!(clean_steps("(note 5.4k)"), Some(5400));
        assert_eq!(clean_steps("6.2K steps"), Some(6200));
        assert_eq!(clean_steps("5000"), Some(5000));
        assert_eq!(clean_steps(""), None);
        assert_eq!(clean_steps("-"), None);
        assert_eq!(clean_steps("rest day"), None);
    }

    #[test]
    fn test_normalise_bedtime_bare_hours() {
        assert_eq!(hm(normalise_bedtime("11")), Some("23:00".into()));
        assert_eq!(hm(normalise_bedtime("3")), Some("03:00".into()));
        assert_eq!(hm(normalise_bedtime("0")), Some("00:00".into()));
        assert_eq!(hm(normalise_bedtime("6")), Some("18:00".into()));
        assert_eq!(hm(normalise_bedtime("12")), Some("12:00".into()));
        assert_eq!(hm(normalise_bedtime("22")), Some("22:00".into()));
        assert_eq!(normalise_bedtime("24"), None);
    }

    #[test]
    fn test_normalise_bedtime_clock_and_aliases() {
        assert_eq!(hm(normalise_bedtime("23:15")), Some("23:15".into()));
        assert_eq!(hm(normalise_bedtime("23:15:00")), Some("23:15".into()));
        assert_eq!(hm(normalise_bedtime("11pm")), Some("23:00".into()));
        assert_eq!(hm(normalise_bedtime("10:30 PM")), Some("22:30".into()));
        assert_eq!(hm(normalise_bedtime("1am")), Some("01:00".into()));
        assert_eq!(hm(normalise_bedtime("Midnight")), Some("00:00".into()));
        assert_eq!(hm(normalise_bedtime("12am")), Some("00:00".into()));
        assert_eq!(hm(normalise_bedtime("0000")), Some("00:00".into()));
        assert_eq!(normalise_bedtime("late"), None);
        assert_eq!(normalise_bedtime(""), None);
        assert_eq!(normalise_bedtime("25:00"), None);
    }

    #[test]
    fn test_categorise_poop_time() {
        assert_eq!(categorise_poop_time("Morning"), Some(PoopTime::Morning));
        assert_eq!(categorise_poop_time("late afternoon"), Some(PoopTime::Afternoon));
        assert_eq!(categorise_poop_time("night"), Some(PoopTime::Evening));
        assert_eq!(categorise_poop_time("after midnight"), Some(PoopTime::Evening));
        assert_eq!(categorise_poop_time("-"), None);
        assert_eq!(categorise_poop_time("  "), None);
        assert_eq!(categorise_poop_time("10:00"), None);
    }

    #[test]
    fn test_bedtime_quality() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        assert_eq!(bedtime_quality(t(22, 30)), BedtimeQuality::OnTime);
        assert_eq!(bedtime_quality(t(20, 0)), BedtimeQuality::OnTime);
        assert_eq!(bedtime_quality(t(0, 0)), BedtimeQuality::OnTime);
        assert_eq!(bedtime_quality(t(0, 30)), BedtimeQuality::Late);
        assert_eq!(bedtime_quality(t(1, 0)), BedtimeQuality::Late);
        assert_eq!(bedtime_quality(None), BedtimeQuality::NoData);
        assert_eq!(BedtimeQuality::Late.label(), "Not OK");
    }

    #[test]
    fn test_sleep_duration_same_evening() {
        let d = sleep_duration(at("2024-03-01", "23:00"), at("2024-03-02", "07:00"));
        assert_eq!(d, Some(8.0));
    }

    #[test]
    fn test_sleep_duration_after_midnight_bedtime() {
        // 01:30 logged on the 1st belongs to the night of the 1st.
        let d = sleep_duration(at("2024-03-01", "01:30"), at("2024-03-02", "07:00"));
        assert_eq!(d, Some(5.5));
    }

    #[test]
    fn test_sleep_duration_missing_endpoint() {
        assert_eq!(sleep_duration(None, at("2024-03-02", "07:00")), None);
        assert_eq!(sleep_duration(at("2024-03-01", "23:00"), None), None);
    }

    #[test]
    fn test_normalise_load_bearing() {
        assert_eq!(normalise_load_bearing("✅"), "Y");
        assert_eq!(normalise_load_bearing("y"), "Y");
        assert_eq!(normalise_load_bearing("hip mobility"), "Y");
        assert_eq!(normalise_load_bearing(" N "), "N");
    }

    #[test]
    fn test_parse_sheet_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_sheet_date(&Cell::text("15/01/2024")), expected);
        assert_eq!(parse_sheet_date(&Cell::text("2024-01-15")), expected);
        assert_eq!(parse_sheet_date(&Cell::Number(45306.0)), expected);
        assert_eq!(parse_sheet_date(&Cell::text("not a date")), None);
        assert_eq!(parse_sheet_date(&Cell::Empty), None);
        assert_eq!(parse_sheet_date(&Cell::Number(0.5)), None);
        assert_eq!(format_sheet_date(expected.unwrap()), "15/01/2024");
    }

    #[test]
    fn test_parse_sheet_date_out_of_range_serial() {
        assert_eq!(parse_sheet_date(&Cell::Number(1e12)), None);
        assert_eq!(parse_sheet_date(&Cell::Number(f64::MAX)), None);
        assert_eq!(parse_sheet_date(&Cell::Number(f64::INFINITY)), None);
        assert_eq!(
            parse_sheet_date(&Cell::Number(2_958_465.0)),
            NaiveDate::from_ymd_opt(9999, 12, 31)
        );
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(139.96), 140.0);
        assert_eq!(round0(139.6), 140.0);
        assert!(is_yes(" Y "));
        assert!(!is_yes("y"));
        assert!(!is_yes("N"));
    }
}
