use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::{DatabaseTarget, MEMORY_URL};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RelmapConfig {
    /// Connection string: `:memory:`, a file path, or a `sqlite://` URL
    pub database: Option<String>,
    /// Log every SQL statement the session issues
    pub echo: Option<bool>,
}

impl RelmapConfig {
    /// Command-line value wins over the config file, which wins over `:memory:`
    pub fn database_url(&self, cli: Option<&str>) -> String {
        cli.or(self.database.as_deref())
            .unwrap_or(MEMORY_URL)
            .to_string()
    }

    pub fn echo(&self) -> bool {
        self.echo.unwrap_or(false)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("relmap.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RelmapConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RelmapConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RelmapConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Create the parent directory of a file-backed database
pub fn ensure_db_dir(database_url: &str) -> anyhow::Result<()> {
    let DatabaseTarget::File(db_path) = DatabaseTarget::parse(database_url) else {
        return Ok(());
    };
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
