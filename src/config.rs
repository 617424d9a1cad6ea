use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fetch::FetchConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1:7878";

/// Contents of `factsync.toml`. Every field is optional; CLI flags win over
/// the file and the file wins over built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FactsyncConfig {
    pub database: Option<String>,
    pub endpoint: Option<String>,
    pub count: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub bind: Option<String>,
}

impl FactsyncConfig {
    /// Fetch settings with defaults filled in
    pub fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            endpoint: self.endpoint.clone().unwrap_or(defaults.endpoint),
            count: self.count.unwrap_or(defaults.count),
            timeout_secs: self.timeout_secs.or(defaults.timeout_secs),
        }
    }

    pub fn database_path(&self, base: &Path) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_database_path_in(base))
    }

    pub fn bind_addr(&self) -> String {
        self.bind.clone().unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    /// The values `init` writes out
    pub fn starter() -> Self {
        let fetch = FetchConfig::default();
        Self {
            database: Some(".factsync/facts.db".to_string()),
            endpoint: Some(fetch.endpoint),
            count: Some(fetch.count),
            timeout_secs: None,
            bind: Some(DEFAULT_BIND.to_string()),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("factsync.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".factsync").join("facts.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<FactsyncConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: FactsyncConfig = toml::from_str(&contents)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &FactsyncConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".factsync/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}
