use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use crate::normalize::round1;
use crate::table::{Cell, Record};

/// Sheet header names. Lookups are case-insensitive and trim whitespace.
pub mod columns {
    pub const DATE: &str = "Date";
    pub const ID: &str = "ID";

    // Reference nutrition table
    pub const FOOD: &str = "Food";
    pub const ALIAS: &str = "Alias";
    pub const PER_UNIT: &str = "Per Unit";
    pub const REF_KCAL: &str = "Kcal";
    pub const REF_PROTEIN: &str = "Protein g";
    pub const REF_CARB: &str = "Carb g";
    pub const REF_FAT: &str = "Fat g";

    // Food log
    pub const MANUAL_INPUT: &str = "Manual Input";
    pub const VALUE: &str = "Value";
    pub const CONVERSION: &str = "Conversion";
    pub const LOG_KCAL: &str = "Kcal";
    pub const LOG_PROTEIN: &str = "P";
    pub const LOG_CARB: &str = "C";
    pub const LOG_FAT: &str = "F";

    // Master table
    pub const KCAL: &str = "Kcal";
    pub const PROTEIN: &str = "Protein (g)";
    pub const CARB: &str = "Carb (g)";
    pub const FAT: &str = "Fat (g)";
    pub const MASTER_MACROS: [&str; 4] = [KCAL, PROTEIN, CARB, FAT];

    // Activity log
    pub const MENSTRUATION: &str = "Menstruation";
    pub const PHASE: &str = "Phase";
    pub const STEPS: &str = "Steps";
    pub const LOAD_BEARING: &str = "Load-bearing";
    pub const BEDTIME: &str = "Bedtime";
    pub const WAKE_UP: &str = "Wake-up time";
    pub const POOP: [&str; 3] = ["Poop time", "Poop", "💩"];
    pub const NOTES: &str = "Notes";

    // Derived
    pub const CYCLE_NO: &str = "Cycle No.";
    pub const PHASE_ID: &str = "Phase_ID";
    pub const CYCLE_DAY: &str = "Cycle_Day";
    pub const BEDTIME_CLEAN: &str = "Bedtime_clean";
    pub const SLEEP_DURATION: &str = "Sleep_duration";
    pub const POOP_TIME: &str = "Poop_time";
    pub const INCLUDE_RECENT: &str = "Include_Last4";
}

/// Calories and macros in grams.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Macros {
    pub kcal: f64,
    pub protein_g: f64,
    pub carb_g: f64,
    pub fat_g: f64,
}

impl Macros {
    #[must_use]
    pub fn new(kcal: f64, protein_g: f64, carb_g: f64, fat_g: f64) -> Self {
        Self {
            kcal,
            protein_g,
            carb_g,
            fat_g,
        }
    }

    /// Multiply every field by `factor`, rounding each to one decimal.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            kcal: round1(factor * self.kcal),
            protein_g: round1(factor * self.protein_g),
            carb_g: round1(factor * self.carb_g),
            fat_g: round1(factor * self.fat_g),
        }
    }

    #[must_use]
    pub fn rounded(&self) -> Self {
        self.scaled(1.0)
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Self) {
        self.kcal += rhs.kcal;
        self.protein_g += rhs.protein_g;
        self.carb_g += rhs.carb_g;
        self.fat_g += rhs.fat_g;
    }
}

/// One row of the reference nutrition table. Values are per `per_unit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodReferenceRow {
    pub name: String,
    pub alias: Option<String>,
    pub per_unit: f64,
    pub per_unit_macros: Macros,
}

impl FoodReferenceRow {
    /// `food` must already be trimmed and lowercased.
    #[must_use]
    pub fn matches(&self, food: &str) -> bool {
        self.name == food || self.alias.as_deref() == Some(food)
    }
}

/// Directly supplied values on a manual food-log row, kept raw until resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualMacros {
    pub kcal: Cell,
    pub protein: Cell,
    pub carb: Cell,
    pub fat: Cell,
}

/// One food-log row as read.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodLogEntry {
    /// 1-based sheet row (header is row 1).
    pub row_number: usize,
    pub date: Cell,
    pub food_name: String,
    pub manual_input: String,
    pub raw_value: String,
    pub raw_conversion: String,
    pub manual: ManualMacros,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NutritionSource {
    Manual,
    Computed,
}

/// Nutrition for one food-log row after resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNutrition {
    pub row_number: usize,
    pub date: Option<NaiveDate>,
    pub raw_date: String,
    pub macros: Macros,
    pub source: NutritionSource,
}

/// Sum of every resolved entry sharing a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub macros: Macros,
    pub entries: usize,
}

/// One row of the master table: the date key, stored macros, and the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub row_number: usize,
    pub date: Option<NaiveDate>,
    pub kcal: Option<f64>,
    pub protein_g: Option<f64>,
    pub carb_g: Option<f64>,
    pub fat_g: Option<f64>,
    /// Columns other than the date and macros, untouched by this crate.
    pub passthrough: Record,
}

/// One row of the activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub row_number: usize,
    pub date: Option<NaiveDate>,
    pub menstruation: String,
    pub phase: Option<Phase>,
    pub steps: String,
    pub load_bearing: String,
    pub bedtime: String,
    pub wake_up: String,
    pub poop_time: String,
    pub notes: String,
    pub passthrough: Record,
}

impl ActivityRow {
    #[must_use]
    pub fn menstruating(&self) -> bool {
        crate::normalize::is_yes(&self.menstruation)
    }
}

/// Menstrual cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
}

impl Phase {
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Phase::Menstrual => 1,
            Phase::Follicular => 2,
            Phase::Ovulatory => 3,
            Phase::Luteal => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Menstrual => "Menstrual",
            Phase::Follicular => "Follicular",
            Phase::Ovulatory => "Ovulatory",
            Phase::Luteal => "Luteal",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "menstrual" => Ok(Phase::Menstrual),
            "follicular" => Ok(Phase::Follicular),
            "ovulatory" => Ok(Phase::Ovulatory),
            "luteal" => Ok(Phase::Luteal),
            other => bail!("Unknown cycle phase: '{other}'"),
        }
    }
}
