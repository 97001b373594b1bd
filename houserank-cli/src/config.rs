/// Config file loading and creation for the houserank CLI.
///
/// Config lives at ~/.config/houserank/config.toml.
/// All fields are optional — CLI args override config values.
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HouserankConfig {
    /// Path of the JSON store file.
    pub data_file: Option<PathBuf>,
    /// Collection used when --collection is not given.
    pub collection: Option<String>,
    /// Ranking used when --ranking is not given.
    pub ranking: Option<String>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# houserank configuration
# All values here can be overridden by CLI flags.

# Where houses and rankings are stored
# data_file = \"/home/me/.local/share/houserank/houses.json\"

# Collection used when --collection is not given
# collection = \"Default Collection\"

# Ranking used when --ranking is not given
# ranking = \"Main Ranking\"
";

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home))
}

/// Returns the default config path: ~/.config/houserank/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".config").join("houserank").join("config.toml"))
}

/// Returns the default store path: ~/.local/share/houserank/houses.json
pub fn default_data_file() -> Result<PathBuf> {
    Ok(home_dir()?.join(".local").join("share").join("houserank").join("houses.json"))
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> Result<HouserankConfig> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HouserankConfig::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read config at {}", path.display())),
    }
}

/// Create the default config file at `path`. Errors if it already exists.
pub fn create_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config to {}", path.display()))
}
