use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use healthsync_core::config::Config as SyncConfig;

pub struct Config {
    /// Directory holding one folder per spreadsheet.
    pub root: PathBuf,
    pub sync: SyncConfig,
}

impl Config {
    /// `root` comes from `--root` / `HEALTHSYNC_ROOT`; otherwise the platform
    /// data directory is used.
    pub fn load(root: Option<PathBuf>) -> Result<Self> {
        let sync = SyncConfig::from_env()?;
        let root = resolve_root(root)?;
        Ok(Config { root, sync })
    }
}

pub fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => {
            let proj_dirs = ProjectDirs::from("", "", "healthsync")
                .context("Could not determine home directory")?;
            proj_dirs.data_dir().join("workbooks")
        }
    };
    ensure_dir(&root)?;
    Ok(root)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create workbook directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_root_is_created() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("books");
        let resolved = resolve_root(Some(root.clone())).unwrap();
        assert_eq!(resolved, root);
        assert!(root.is_dir());
    }
}
