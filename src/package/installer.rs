use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::model::descriptor::PackageDescriptor;
use crate::model::manifest::{ManifestDocument, ManifestStore, MergeOutcome};
use crate::package::error::{BranchError, ManifestError};
use crate::package::fetcher::Fetcher;
use crate::package::session::{CancelToken, InstallReport, InstallSession, Visit};
use crate::package::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub scratch_dir: PathBuf,
    /// Descriptor file name, relative to a fetched workspace's root.
    pub descriptor_file: String,
    pub warn_on_conflict: bool,
}

#[derive(Debug)]
pub struct InstallOutcome {
    pub success: bool,
    pub message: String,
    pub report: InstallReport,
}

impl InstallOutcome {
    fn aborted(message: String) -> Self {
        Self {
            success: false,
            message,
            report: InstallReport::default(),
        }
    }
}

/// A package that made it through resolution.
#[derive(Debug)]
struct Resolved {
    name: String,
    duplicate: bool,
}

/// Fetches a package, recursively installs what it depends on, then
/// records it in the manifest.
///
/// Each package is fetched into its own workspace, which is released
/// before its resolution returns. The manifest is persisted after every
/// merge, so a failure deep in the tree keeps whatever already landed.
pub struct Installer<F> {
    fetcher: F,
    store: ManifestStore,
    options: InstallOptions,
    cancel: CancelToken,
    manifest: Option<ManifestDocument>,
}

impl<F: Fetcher> Installer<F> {
    pub fn new(fetcher: F, store: ManifestStore, options: InstallOptions) -> Self {
        Self {
            fetcher,
            store,
            options,
            cancel: CancelToken::default(),
            manifest: None,
        }
    }

    /// Token that stops the install in progress before its next fetch.
    /// Every install starts uncancelled.
    #[allow(dead_code)] // Triggered by embedders driving installs from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn manifest_path(&self) -> &std::path::Path {
        self.store.path()
    }

    pub fn install(&mut self, locator: &str) -> InstallOutcome {
        self.cancel.reset();
        let mut doc = match self.store.load() {
            Ok(doc) => doc,
            Err(err) => {
                tracing::error!("install of {locator} aborted: {err}");
                return InstallOutcome::aborted(format!("cannot install {locator}: {err}"));
            }
        };

        tracing::info!("installing {locator} into {}", self.store.path().display());
        let mut session = InstallSession::new();
        let root = self.resolve(locator, &mut doc, &mut session);
        self.manifest = Some(doc);
        tracing::debug!("merge order: {:?}", session.report.merged_names());

        let (success, message) = match root {
            Ok(resolved) => (true, summary(&resolved, &session.report)),
            Err(err) => {
                let message = format!("failed to install {locator}: {err}");
                tracing::warn!("{message}");
                session.record_failure(locator, err);
                (false, message)
            }
        };

        InstallOutcome {
            success,
            message,
            report: session.finish(),
        }
    }

    /// Dependency names of the in-memory manifest, loading it when no
    /// install has run yet.
    pub fn installed_names(&mut self) -> Result<BTreeSet<String>, ManifestError> {
        Ok(self.manifest()?.names().into_iter().collect())
    }

    pub fn manifest(&mut self) -> Result<&ManifestDocument, ManifestError> {
        if self.manifest.is_none() {
            self.manifest = Some(self.store.load()?);
        }
        self.manifest
            .as_ref()
            .ok_or_else(|| ManifestError::NotFound(self.store.path().to_path_buf()))
    }

    /// Drop the cached manifest so the next read goes to disk.
    pub fn invalidate(&mut self) {
        self.manifest = None;
    }

    fn resolve(
        &self,
        locator: &str,
        doc: &mut ManifestDocument,
        session: &mut InstallSession,
    ) -> Result<Resolved, BranchError> {
        if self.cancel.is_cancelled() {
            return Err(BranchError::Cancelled);
        }
        if let Some(name) = session.known(locator) {
            tracing::debug!("{locator} already resolved to {name}, skipping");
            return Ok(Resolved {
                name,
                duplicate: true,
            });
        }

        let workspace =
            Workspace::create(&self.options.scratch_dir).map_err(BranchError::Workspace)?;
        let result = self.resolve_in(&workspace, locator, doc, session);

        if let Err(err) = workspace.close() {
            tracing::warn!("failed to remove workspace for {locator}: {err}");
        }
        result
    }

    fn resolve_in(
        &self,
        workspace: &Workspace,
        locator: &str,
        doc: &mut ManifestDocument,
        session: &mut InstallSession,
    ) -> Result<Resolved, BranchError> {
        let checkout = workspace.checkout();
        tracing::debug!("fetching {locator} into {}", workspace.root().display());
        self.fetcher.fetch(locator, &checkout)?;
        let descriptor = PackageDescriptor::parse(&checkout, &self.options.descriptor_file)?;
        let name = descriptor.name;

        if let Visit::Duplicate(conflict) = session.visit(&name, locator) {
            match conflict {
                Some(conflict) if self.options.warn_on_conflict => tracing::warn!(
                    "{name} requested from {} but already installed from {} this session",
                    conflict.locator,
                    conflict.previous
                ),
                _ => tracing::debug!("{name} already resolved, skipping {locator}"),
            }
            return Ok(Resolved {
                name,
                duplicate: true,
            });
        }

        for dependency in &descriptor.dependencies {
            match self.resolve(&dependency.locator, doc, session) {
                Ok(resolved) if resolved.name != dependency.name => tracing::warn!(
                    "{name} declares {} but {} provides {}",
                    dependency.name,
                    dependency.locator,
                    resolved.name
                ),
                Ok(_) => {}
                Err(BranchError::Cancelled) => return Err(BranchError::Cancelled),
                Err(err) => {
                    tracing::warn!(
                        "{name}: dependency {} ({}) failed: {err}",
                        dependency.name,
                        dependency.locator
                    );
                    session.record_failure(&dependency.locator, err);
                }
            }
        }

        // Only what reached disk counts as merged.
        let outcome = doc.merge(&name, locator);
        if let Err(err) = self.store.persist(doc) {
            doc.revert(&name, &outcome);
            return Err(err.into());
        }
        match outcome {
            MergeOutcome::Replaced { previous } => {
                tracing::info!("{name}: replaced {previous} with {locator}")
            }
            MergeOutcome::Inserted | MergeOutcome::Unchanged => {
                tracing::info!("{name}: installed from {locator}")
            }
        }
        session.record_merge(&name, locator);

        Ok(Resolved {
            name,
            duplicate: false,
        })
    }
}

fn summary(root: &Resolved, report: &InstallReport) -> String {
    let mut message = if root.duplicate {
        format!("{} already installed", root.name)
    } else {
        format!("installed {}", root.name)
    };

    let dependencies = report.merged.len().saturating_sub(usize::from(!root.duplicate));
    if dependencies > 0 {
        message.push_str(&format!(" with {dependencies} dependencies"));
    }
    if !report.failures.is_empty() {
        message.push_str(&format!("; {} failed", report.failures.len()));
    }
    if !report.conflicts.is_empty() {
        message.push_str(&format!("; {} conflicting locators", report.conflicts.len()));
    }
    message
}
