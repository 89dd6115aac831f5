//! Server settings loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use trustline_db::DbConfig;
use trustline_pki::PkiConfig;

pub const CONFIG_ENV: &str = "TRUSTLINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/trustline.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DbConfig,
    pub pki: PkiConfig,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse settings")
    }
}

/// First CLI argument, then `TRUSTLINE_CONFIG`, then the default path.
pub fn resolve_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
