use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG: &str = "VOXELREEL_CONFIG";
pub const ENV_CONFIG_DIR: &str = "VOXELREEL_CONFIG_DIR";
pub const DECK_FILE: &str = "slides.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Voxelreel";
const APPLICATION: &str = "voxelreel";

/// Where a resolved deck path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Flag,
    Environment,
    ConfigDir,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Flag => "--config",
            ConfigSource::Environment => ENV_CONFIG,
            ConfigSource::ConfigDir => "config dir",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    env_config: Option<PathBuf>,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_dir = match env_override(ENV_CONFIG_DIR) {
            Some(dir) => dir,
            None => ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
                .ok_or_else(|| anyhow!("failed to determine user directories"))?
                .config_dir()
                .to_path_buf(),
        };
        Ok(Self {
            config_dir,
            env_config: env_override(ENV_CONFIG),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn default_deck(&self) -> PathBuf {
        self.config_dir.join(DECK_FILE)
    }

    /// Applies the discovery order: the flag, then `$VOXELREEL_CONFIG`, then
    /// `slides.toml` in the config directory.
    pub fn candidate(&self, flag: Option<&Path>) -> (PathBuf, ConfigSource) {
        if let Some(path) = flag {
            return (path.to_path_buf(), ConfigSource::Flag);
        }
        if let Some(path) = &self.env_config {
            return (path.clone(), ConfigSource::Environment);
        }
        (self.default_deck(), ConfigSource::ConfigDir)
    }

    pub fn resolve_deck(&self, flag: Option<&Path>) -> Result<(PathBuf, ConfigSource)> {
        let (path, source) = self.candidate(flag);
        if !path.is_file() {
            bail!(
                "slide deck not found at {} (from {}); pass --config or create it",
                path.display(),
                source.as_str()
            );
        }
        Ok((path, source))
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, env_config: Option<PathBuf>) -> Self {
        Self {
            config_dir,
            env_config,
        }
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
