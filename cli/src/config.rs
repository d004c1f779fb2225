use anyhow::{Context, Result};
use directories::ProjectDirs;
use fittrack_core::db::{DEFAULT_USER_ID, DbConfig};
use std::path::PathBuf;

const DATABASE_VARS: [&str; 2] = ["FITTRACK_DATABASE", "DATABASE_URL"];
const USER_ID_VAR: &str = "FITTRACK_USER_ID";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub user_id: i64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), default_db_path)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        default_path: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let configured = DATABASE_VARS
            .iter()
            .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()));

        let db_path = match configured {
            Some(url) => {
                let url = url.trim();
                PathBuf::from(url.strip_prefix("sqlite://").unwrap_or(url))
            }
            None => default_path()?,
        };

        let user_id = match lookup(USER_ID_VAR) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{USER_ID_VAR} must be an integer, got '{raw}'"))?,
            None => DEFAULT_USER_ID,
        };

        Ok(Config { db_path, user_id })
    }

    #[must_use]
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path)
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "fittrack").context("Could not determine home directory")?;

    let data_dir = proj_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    Ok(data_dir.join("fittrack.db"))
}
