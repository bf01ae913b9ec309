use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::cycle::DEFAULT_CYCLE_OFFSET;
use crate::error::SyncError;
use crate::merge::{DEFAULT_BATCH_SIZE, MergeComparison};
use crate::table::{Locator, column_number};

pub const DEFAULT_PROTECTED_TAB: &str = "Worksheet";
pub const DEFAULT_CYCLE_DEST_TAB: &str = "DB";
pub const DEFAULT_CYCLES_TO_DISPLAY: u32 = 4;
pub const DEFAULT_NUTRITION_COLUMN: &str = "G";

const PRODUCTION_ENVS: [&str; 2] = ["prod", "production"];

/// Where the service-account key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Inline,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub source: CredentialSource,
    pub client_email: Option<String>,
}

#[derive(Deserialize)]
struct KeyFile {
    client_email: Option<String>,
}

impl Credentials {
    /// `KEY_FILE_NAME` holds either the JSON itself or a path to it.
    pub fn load(value: &str) -> Result<Self, SyncError> {
        let value = value.trim();
        let (source, json) = if value.starts_with('{') {
            debug!("using inline credentials");
            (CredentialSource::Inline, value.to_string())
        } else {
            let path = PathBuf::from(value);
            debug!(path = %path.display(), "loading credentials file");
            let json = std::fs::read_to_string(&path).map_err(|e| {
                SyncError::Config(format!("cannot read KEY_FILE_NAME {}: {e}", path.display()))
            })?;
            (CredentialSource::File(path), json)
        };
        let key: KeyFile = serde_json::from_str(&json)
            .map_err(|e| SyncError::Config(format!("KEY_FILE_NAME is not valid JSON: {e}")))?;
        Ok(Self {
            source,
            client_email: key.client_email,
        })
    }
}

/// Locators the nutrition pipeline touches.
#[derive(Debug, Clone)]
pub struct NutritionTargets {
    pub food_data: Locator,
    pub food_log: Locator,
    pub master_table: Locator,
}

#[derive(Debug, Clone)]
pub struct TacticalTargets {
    pub master_table: Locator,
    pub activity_log: Locator,
    pub tactical_db: Locator,
}

#[derive(Debug, Clone)]
pub struct CycleDbTargets {
    pub source: String,
    pub dest: Locator,
}

/// Run configuration, read once from the environment and passed by reference.
///
/// Locators are optional here; each pipeline asks for the ones it needs and
/// gets a configuration error naming the missing variable.
#[derive(Debug, Clone)]
pub struct Config {
    pub env_name: String,
    pub credentials: Credentials,
    pub food_data: Option<Locator>,
    pub food_log: Option<Locator>,
    pub master_table: Option<Locator>,
    pub activity_log: Option<Locator>,
    pub tactical_db: Option<Locator>,
    pub cycle_source: Option<String>,
    pub cycle_dest: Option<Locator>,
    pub protected_tab: String,
    pub cycle_offset: u32,
    pub cycles_to_display: u32,
    pub merge_comparison: MergeComparison,
    pub write_batch_size: usize,
    /// 1-based column where the food-log nutrition block starts.
    pub nutrition_column: usize,
}

fn missing(name: &str) -> SyncError {
    SyncError::Config(format!("{name} missing"))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, SyncError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("{name} must be a number, got '{v}'"))),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, SyncError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let env_name = var("ENV_NAME").ok_or_else(|| missing("ENV_NAME"))?;
        let key = var("KEY_FILE_NAME").ok_or_else(|| missing("KEY_FILE_NAME"))?;
        let credentials = Credentials::load(&key)?;

        let mut locator = |prefix: &str| {
            let url = var(&format!("{prefix}_URL"));
            let tab = var(&format!("{prefix}_URL_SHEET"));
            url.zip(tab).map(|(url, tab)| Locator::new(url, tab))
        };
        let food_data = locator("FOOD_DATA");
        let food_log = locator("FOOD_LOG");
        let master_table = locator("MASTER_TABLE");
        let activity_log = locator("ACTIVITY_LOG");
        let tactical_db = locator("TACTICAL_DB");

        let cycle_source = var("CYCLE_SOURCE_URL").or_else(|| var("CYCLE_TRACKER_URL"));
        let cycle_dest = var("CYCLE_DEST_URL").map(|url| {
            let tab = var("CYCLE_DEST_TAB").unwrap_or_else(|| DEFAULT_CYCLE_DEST_TAB.to_string());
            Locator::new(url, tab)
        });

        let protected_tab =
            var("PROTECTED_TAB").unwrap_or_else(|| DEFAULT_PROTECTED_TAB.to_string());
        let cycle_offset = parse_number("CYCLE_OFFSET", var("CYCLE_OFFSET"), DEFAULT_CYCLE_OFFSET)?;
        let cycles_to_display = parse_number(
            "CYCLES_TO_DISPLAY",
            var("CYCLES_TO_DISPLAY"),
            DEFAULT_CYCLES_TO_DISPLAY,
        )?;
        let write_batch_size =
            parse_number("WRITE_BATCH_SIZE", var("WRITE_BATCH_SIZE"), DEFAULT_BATCH_SIZE)?;
        if write_batch_size == 0 {
            return Err(SyncError::Config("WRITE_BATCH_SIZE must be at least 1".into()));
        }
        let merge_comparison = match var("MERGE_COMPARE") {
            None => MergeComparison::default(),
            Some(v) => v.parse().map_err(|e| SyncError::Config(format!("MERGE_COMPARE: {e}")))?,
        };
        let column = var("FOOD_LOG_NUTRITION_COLUMN")
            .unwrap_or_else(|| DEFAULT_NUTRITION_COLUMN.to_string());
        let nutrition_column = column_number(&column).ok_or_else(|| {
            SyncError::Config(format!("FOOD_LOG_NUTRITION_COLUMN is not a column letter: '{column}'"))
        })?;

        Ok(Self {
            env_name,
            credentials,
            food_data,
            food_log,
            master_table,
            activity_log,
            tactical_db,
            cycle_source,
            cycle_dest,
            protected_tab,
            cycle_offset,
            cycles_to_display,
            merge_comparison,
            write_batch_size,
            nutrition_column,
        })
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        PRODUCTION_ENVS.contains(&self.env_name.to_lowercase().as_str())
    }

    /// Refuse writes to the protected tab outside production.
    pub fn guard_write(&self, target: &Locator) -> Result<(), SyncError> {
        if target.tab.trim() == self.protected_tab && !self.is_production() {
            return Err(SyncError::ProtectedTab {
                tab: target.tab.clone(),
                env: self.env_name.clone(),
            });
        }
        Ok(())
    }

    fn require(locator: Option<&Locator>, name: &str) -> Result<Locator, SyncError> {
        locator
            .cloned()
            .ok_or_else(|| missing(&format!("{name}_URL / {name}_URL_SHEET")))
    }

    pub fn nutrition_targets(&self) -> Result<NutritionTargets, SyncError> {
        let targets = NutritionTargets {
            food_data: Self::require(self.food_data.as_ref(), "FOOD_DATA")?,
            food_log: Self::require(self.food_log.as_ref(), "FOOD_LOG")?,
            master_table: Self::require(self.master_table.as_ref(), "MASTER_TABLE")?,
        };
        self.guard_write(&targets.food_log)?;
        self.guard_write(&targets.master_table)?;
        Ok(targets)
    }

    pub fn tactical_targets(&self) -> Result<TacticalTargets, SyncError> {
        let targets = TacticalTargets {
            master_table: Self::require(self.master_table.as_ref(), "MASTER_TABLE")?,
            activity_log: Self::require(self.activity_log.as_ref(), "ACTIVITY_LOG")?,
            tactical_db: Self::require(self.tactical_db.as_ref(), "TACTICAL_DB")?,
        };
        self.guard_write(&targets.tactical_db)?;
        Ok(targets)
    }

    /// `tab` overrides `CYCLE_DEST_TAB`.
    pub fn cycle_db_targets(&self, tab: Option<&str>) -> Result<CycleDbTargets, SyncError> {
        let source = self
            .cycle_source
            .clone()
            .ok_or_else(|| missing("CYCLE_SOURCE_URL (or CYCLE_TRACKER_URL)"))?;
        let mut dest = self.cycle_dest.clone().ok_or_else(|| missing("CYCLE_DEST_URL"))?;
        if let Some(tab) = tab {
            dest.tab = tab.to_string();
        }
        self.guard_write(&dest)?;
        Ok(CycleDbTargets { source, dest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = r#"{"type": "service_account", "client_email": "bot@example.iam"}"#;

    fn env(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn full() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ENV_NAME", "dev"),
            ("KEY_FILE_NAME", KEY),
            ("FOOD_DATA_URL", "food"),
            ("FOOD_DATA_URL_SHEET", "Reference"),
            ("FOOD_LOG_URL", "log"),
            ("FOOD_LOG_URL_SHEET", "Test log"),
            ("MASTER_TABLE_URL", "master"),
            ("MASTER_TABLE_URL_SHEET", "Master"),
            ("ACTIVITY_LOG_URL", "activity"),
            ("ACTIVITY_LOG_URL_SHEET", "Log"),
            ("TACTICAL_DB_URL", "tactical"),
            ("TACTICAL_DB_URL_SHEET", "Tactical"),
            ("CYCLE_TRACKER_URL", "tracker"),
            ("CYCLE_DEST_URL", "dest"),
        ]
    }

    #[test]
    fn test_from_env_defaults() {
        let cfg = Config::from_env_with(env(&full())).unwrap();
        assert_eq!(cfg.env_name, "dev");
        assert_eq!(cfg.credentials.source, CredentialSource::Inline);
        assert_eq!(cfg.credentials.client_email.as_deref(), Some("bot@example.iam"));
        assert_eq!(cfg.protected_tab, "Worksheet");
        assert_eq!(cfg.cycle_offset, 3);
        assert_eq!(cfg.cycles_to_display, 4);
        assert_eq!(cfg.write_batch_size, 60);
        assert_eq!(cfg.nutrition_column, 7);
        assert_eq!(cfg.merge_comparison, MergeComparison::Kcal);
        assert_eq!(cfg.cycle_source.as_deref(), Some("tracker"));
        assert_eq!(cfg.cycle_dest.unwrap().tab, "DB");
    }

    #[test]
    fn test_missing_env_name_is_config_error() {
        let vars: Vec<_> = full().into_iter().filter(|(k, _)| *k != "ENV_NAME").collect();
        let err = Config::from_env_with(env(&vars)).unwrap_err();
        assert_eq!(err, SyncError::Config("ENV_NAME missing".into()));

        let mut blank = full();
        blank[0] = ("ENV_NAME", "  ");
        assert!(Config::from_env_with(env(&blank)).is_err());
    }

    #[test]
    fn test_credentials_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(&path, KEY).unwrap();
        let creds = Credentials::load(path.to_str().unwrap()).unwrap();
        assert_eq!(creds.source, CredentialSource::File(path));

        assert!(Credentials::load("/nonexistent/key.json").is_err());
        assert!(Credentials::load("{not json").is_err());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut vars = full();
        vars.push(("CYCLE_OFFSET", "three"));
        assert!(Config::from_env_with(env(&vars)).is_err());

        let mut vars = full();
        vars.push(("MERGE_COMPARE", "protein"));
        assert!(Config::from_env_with(env(&vars)).is_err());

        let mut vars = full();
        vars.push(("FOOD_LOG_NUTRITION_COLUMN", "7"));
        assert!(Config::from_env_with(env(&vars)).is_err());
    }

    #[test]
    fn test_guard_protects_worksheet_outside_prod() {
        let mut vars = full();
        vars[5] = ("FOOD_LOG_URL_SHEET", "Worksheet");
        let cfg = Config::from_env_with(env(&vars)).unwrap();
        let err = cfg.nutrition_targets().unwrap_err();
        assert!(matches!(err, SyncError::ProtectedTab { .. }));

        vars[0] = ("ENV_NAME", "PROD");
        let cfg = Config::from_env_with(env(&vars)).unwrap();
        assert!(cfg.nutrition_targets().is_ok());
    }

    #[test]
    fn test_targets_name_missing_variables() {
        let vars: Vec<_> = full()
            .into_iter()
            .filter(|(k, _)| !k.starts_with("TACTICAL"))
            .collect();
        let cfg = Config::from_env_with(env(&vars)).unwrap();
        assert!(cfg.nutrition_targets().is_ok());
        let err = cfg.tactical_targets().unwrap_err();
        assert!(err.to_string().contains("TACTICAL_DB_URL"));
    }

    #[test]
    fn test_cycle_db_tab_override() {
        let cfg = Config::from_env_with(env(&full())).unwrap();
        let targets = cfg.cycle_db_targets(Some("Combined")).unwrap();
        assert_eq!(targets.source, "tracker");
        assert_eq!(targets.dest, Locator::new("dest", "Combined"));
        assert!(cfg.cycle_db_targets(Some("Worksheet")).is_err());
    }
}
