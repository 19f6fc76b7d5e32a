use crate::bridge::grammar;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bridge configuration, read from `tsbridge.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Grammars `tree-sitter-language-load` may hand out
    pub languages: Vec<String>,
    /// Cap on in-progress matches per query cursor
    pub match_limit: Option<u32>,
    /// Grammar the CLI uses when none is given or inferred
    pub default_language: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            languages: grammar::BUILTIN.iter().map(|g| g.name.to_string()).collect(),
            match_limit: None,
            default_language: None,
        }
    }
}

impl BridgeConfig {
    /// Whether the grammar called `name` is enabled
    pub fn language_enabled(&self, name: &str) -> bool {
        self.languages.iter().any(|enabled| {
            grammar::find(enabled).is_some_and(|g| g.name == name) || enabled.eq_ignore_ascii_case(name)
        })
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("tsbridge.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<BridgeConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: BridgeConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &BridgeConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("tsbridge.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tsbridge.toml");
        let config = BridgeConfig {
            languages: vec!["rust".to_string(), "py".to_string()],
            match_limit: Some(64),
            default_language: Some("rust".to_string()),
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), Some(config));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tsbridge.toml");
        std::fs::write(&path, "match_limit = 8\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.match_limit, Some(8));
        assert_eq!(config.languages, BridgeConfig::default().languages);
    }

    #[test]
    fn test_language_enabled_accepts_aliases() {
        let config = BridgeConfig {
            languages: vec!["py".to_string()],
            ..BridgeConfig::default()
        };
        assert!(config.language_enabled("python"));
        assert!(!config.language_enabled("rust"));
        assert!(BridgeConfig::default().language_enabled("go"));
    }
}
