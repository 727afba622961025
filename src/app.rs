use anyhow::{Result, bail};

use crate::model::config::AppConfig;
use crate::model::manifest::ManifestStore;
use crate::package::{Fetcher, GitFetcher, InstallOptions, InstallOutcome, Installer};

/// Shortcut state as the install controls see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutStatus {
    Available,
    Installed,
}

impl ShortcutStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ShortcutStatus::Available => "available",
            ShortcutStatus::Installed => "installed",
        }
    }
}

/// Front end over the installer: turns commands into engine calls and
/// results into notification lines.
pub struct App<F = GitFetcher> {
    pub config: AppConfig,
    installer: Installer<F>,
}

impl App<GitFetcher> {
    pub fn new(config: AppConfig) -> Self {
        let fetcher = GitFetcher::new(config.git.program.clone(), config.git.shallow);
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: Fetcher> App<F> {
    pub fn with_fetcher(config: AppConfig, fetcher: F) -> Self {
        let options = InstallOptions {
            scratch_dir: config.scratch_dir(),
            descriptor_file: config.paths.descriptor.clone(),
            warn_on_conflict: config.install.warn_on_conflict,
        };
        let installer = Installer::new(fetcher, ManifestStore::new(config.manifest_path()), options);
        Self { config, installer }
    }

    pub fn install(&mut self, locator: &str) -> (InstallOutcome, Vec<String>) {
        let outcome = self.installer.install(locator);

        let mut notes = vec![outcome.message.clone()];
        notes.extend(outcome.report.failures.iter().map(|failure| {
            format!("  failed {}: {}", failure.locator, failure.error)
        }));
        notes.extend(outcome.report.conflicts.iter().map(|conflict| {
            format!(
                "  conflict {}: kept {}, ignored {}",
                conflict.name, conflict.previous, conflict.locator
            )
        }));
        (outcome, notes)
    }

    pub fn install_shortcut(&mut self, package_name: &str) -> Result<(InstallOutcome, Vec<String>)> {
        let Some(shortcut) = self.config.shortcut(package_name) else {
            bail!("no shortcut named {package_name}");
        };
        let locator = shortcut.git_url.clone();
        Ok(self.install(&locator))
    }

    /// Manifest entries as `name -> locator` lines, read fresh from disk.
    pub fn list(&mut self) -> Result<Vec<String>> {
        self.installer.invalidate();
        let manifest = self.installer.manifest()?;
        if manifest.is_empty() {
            return Ok(vec!["manifest: no dependencies".to_string()]);
        }

        Ok(manifest
            .entries()
            .map(|(name, locator)| format!("{name} -> {locator}"))
            .collect())
    }

    pub fn shortcut_statuses(&mut self) -> Result<Vec<(String, ShortcutStatus)>> {
        let installed = self.installer.installed_names()?;
        Ok(self
            .config
            .shortcuts
            .iter()
            .map(|shortcut| {
                let status = if installed.contains(&shortcut.package_name) {
                    ShortcutStatus::Installed
                } else {
                    ShortcutStatus::Available
                };
                (shortcut.package_name.clone(), status)
            })
            .collect())
    }

    pub fn shortcuts(&mut self) -> Result<Vec<String>> {
        if self.config.shortcuts.is_empty() {
            return Ok(vec!["shortcuts: none configured".to_string()]);
        }

        let statuses = self.shortcut_statuses()?;
        Ok(self
            .config
            .shortcuts
            .iter()
            .zip(statuses)
            .map(|(shortcut, (name, status))| {
                format!("{name} [{}] ({})", status.label(), shortcut.git_url)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::error::FetchError;
    use std::path::Path;

    struct StaticFetcher;

    impl Fetcher for StaticFetcher {
        fn fetch(&self, locator: &str, destination: &Path) -> Result<(), FetchError> {
            let Some(name) = locator.strip_prefix("repo://") else {
                return Err(FetchError::Failed {
                    locator: locator.to_string(),
                    status: "exit status: 128".to_string(),
                    stderr: "not a repository".to_string(),
                });
            };
            std::fs::create_dir_all(destination).unwrap();
            std::fs::write(
                destination.join("package.json"),
                format!(r#"{{"name": "{name}"}}"#),
            )
            .unwrap();
            Ok(())
        }
    }

    fn app(dir: &Path) -> App<StaticFetcher> {
        let manifest = dir.join("manifest.json");
        std::fs::write(&manifest, r#"{"dependencies": {}}"#).unwrap();

        let user = format!(
            r#"
            [paths]
            manifest = "{}"
            scratch_dir = "{}"

            [[shortcuts]]
            package_name = "tools"
            git_url = "repo://tools"

            [[shortcuts]]
            package_name = "broken"
            git_url = "https://invalid.example/broken.git"
            "#,
            manifest.display(),
            dir.join("scratch").display()
        );
        let config =
            AppConfig::from_layers(&[include_str!("../config/default.toml"), user.as_str()]).unwrap();
        App::with_fetcher(config, StaticFetcher)
    }

    #[test]
    fn shortcut_becomes_installed_after_install() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        assert_eq!(
            app.shortcuts().unwrap(),
            [
                "tools [available] (repo://tools)",
                "broken [available] (https://invalid.example/broken.git)"
            ]
        );

        let (outcome, notes) = app.install_shortcut("tools").unwrap();
        assert!(outcome.success);
        assert_eq!(notes, ["installed tools"]);

        let statuses = app.shortcut_statuses().unwrap();
        assert_eq!(statuses[0], ("tools".to_string(), ShortcutStatus::Installed));
        assert_eq!(statuses[1], ("broken".to_string(), ShortcutStatus::Available));
        assert_eq!(app.list().unwrap(), ["tools -> repo://tools"]);
    }

    #[test]
    fn failed_install_lists_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let (outcome, notes) = app.install_shortcut("broken").unwrap();
        assert!(!outcome.success);
        assert_eq!(notes.len(), 2);
        assert!(notes[1].contains("not a repository"));
        assert_eq!(app.list().unwrap(), ["manifest: no dependencies"]);
    }

    #[test]
    fn locator_is_passed_through_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let (outcome, _) = app.install(" repo://tools");

        assert!(!outcome.success);
        assert_eq!(outcome.report.failures[0].locator, " repo://tools");
        assert_eq!(app.list().unwrap(), ["manifest: no dependencies"]);
    }

    #[test]
    fn unknown_shortcut_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(app.install_shortcut("nope").is_err());
    }
}
