use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_CONFIG: &str = "cpi.toml";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub git: GitConfig,
    pub install: InstallConfig,
    #[serde(default)]
    pub shortcuts: Vec<Shortcut>,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    pub manifest: String,
    pub descriptor: String,
    pub scratch_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct GitConfig {
    pub program: String,
    pub shallow: bool,
}

#[derive(Debug, Deserialize)]
pub struct InstallConfig {
    pub warn_on_conflict: bool,
}

/// A package offered for one-step install.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Shortcut {
    pub package_name: String,
    pub git_url: String,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config → `cpi.toml`
    /// in the working directory.
    pub fn load() -> Result<Self> {
        let mut layers = vec![include_str!("../../config/default.toml").to_string()];

        let mut candidates = Vec::new();
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "cpi") {
            candidates.push(proj_dirs.config_dir().join("config.toml"));
        }
        candidates.push(PathBuf::from(PROJECT_CONFIG));

        for path in candidates {
            if path.exists() {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                tracing::debug!("config layer {}", path.display());
                layers.push(raw);
            }
        }

        Self::from_layers(&layers)
    }

    /// Later layers override earlier ones key by key. Tables merge; any
    /// other value, arrays included, replaces.
    pub fn from_layers(layers: &[impl AsRef<str>]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for layer in layers {
            let table: toml::Table = toml::from_str(layer.as_ref())?;
            merge_tables(&mut merged, table);
        }

        let mut config: AppConfig = toml::Value::Table(merged).try_into()?;

        if config.paths.scratch_dir.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            config.paths.scratch_dir =
                config
                    .paths
                    .scratch_dir
                    .replacen('~', &home.to_string_lossy(), 1);
        }

        Ok(config)
    }

    pub fn manifest_path(&self) -> PathBuf {
        PathBuf::from(&self.paths.manifest)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        if self.paths.scratch_dir.is_empty() {
            return std::env::temp_dir().join("cpi");
        }
        PathBuf::from(&self.paths.scratch_dir)
    }

    pub fn shortcut(&self, package_name: &str) -> Option<&Shortcut> {
        self.shortcuts
            .iter()
            .find(|shortcut| shortcut.package_name == package_name)
    }

    pub fn set_manifest_path(&mut self, path: &Path) {
        self.paths.manifest = path.to_string_lossy().into_owned();
    }

    pub fn set_scratch_dir(&mut self, path: &Path) {
        self.paths.scratch_dir = path.to_string_lossy().into_owned();
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
