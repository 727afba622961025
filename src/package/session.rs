use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::package::error::BranchError;

/// Shared flag checked before every fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[allow(dead_code)] // Triggered by embedders driving installs from another thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct BranchFailure {
    pub locator: String,
    pub error: BranchError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub name: String,
    pub previous: String,
    pub locator: String,
}

/// Everything one top-level install did, in the order it happened.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// `(name, locator)` pairs in merge order; children precede parents.
    pub merged: Vec<(String, String)>,
    /// Names whose fetch turned out to be a duplicate within the session.
    pub skipped: Vec<String>,
    pub failures: Vec<BranchFailure>,
    pub conflicts: Vec<Conflict>,
}

impl InstallReport {
    pub fn merged_names(&self) -> Vec<&str> {
        self.merged.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Result of claiming a package name within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    First,
    /// Already claimed; carries the conflict when the earlier claim came
    /// from a different locator.
    Duplicate(Option<Conflict>),
}

/// Bookkeeping for one top-level install.
#[derive(Debug, Default)]
pub struct InstallSession {
    /// Claimed package names and the locator that claimed each.
    visited: HashMap<String, String>,
    /// Every fetched locator whose descriptor was read, and the name it gave.
    resolved: HashMap<String, String>,
    pub report: InstallReport,
}

impl InstallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name already produced by `locator` in this session. A hit counts as
    /// a skipped duplicate.
    pub fn known(&mut self, locator: &str) -> Option<String> {
        let name = self.resolved.get(locator)?.clone();
        self.report.skipped.push(name.clone());
        Some(name)
    }

    pub fn visit(&mut self, name: &str, locator: &str) -> Visit {
        self.resolved.insert(locator.to_string(), name.to_string());
        let Some(previous) = self.visited.get(name) else {
            self.visited.insert(name.to_string(), locator.to_string());
            return Visit::First;
        };

        self.report.skipped.push(name.to_string());
        if previous == locator {
            return Visit::Duplicate(None);
        }

        let conflict = Conflict {
            name: name.to_string(),
            previous: previous.clone(),
            locator: locator.to_string(),
        };
        self.report.conflicts.push(conflict.clone());
        Visit::Duplicate(Some(conflict))
    }

    pub fn record_merge(&mut self, name: &str, locator: &str) {
        self.report
            .merged
            .push((name.to_string(), locator.to_string()));
    }

    pub fn record_failure(&mut self, locator: &str, error: BranchError) {
        self.report.failures.push(BranchFailure {
            locator: locator.to_string(),
            error,
        });
    }

    pub fn finish(self) -> InstallReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_claims_name_once() {
        let mut session = InstallSession::new();
        assert_eq!(session.visit("pkgA", "repo://A"), Visit::First);
        assert_eq!(session.visit("pkgA", "repo://A"), Visit::Duplicate(None));
        assert_eq!(session.visit("pkgB", "repo://B"), Visit::First);
    }

    #[test]
    fn known_locator_is_reported_as_skip() {
        let mut session = InstallSession::new();
        assert_eq!(session.known("repo://A"), None);

        session.visit("pkgA", "repo://A");
        assert_eq!(session.known("repo://A").as_deref(), Some("pkgA"));
        assert_eq!(session.finish().skipped, ["pkgA"]);
    }

    #[test]
    fn duplicate_from_other_locator_is_a_conflict() {
        let mut session = InstallSession::new();
        session.visit("foo", "repo://one");

        let Visit::Duplicate(Some(conflict)) = session.visit("foo", "repo://two") else {
            panic!("expected a conflict");
        };
        assert_eq!(conflict.previous, "repo://one");
        assert_eq!(conflict.locator, "repo://two");

        let report = session.finish();
        assert_eq!(report.skipped, ["foo"]);
        assert_eq!(report.conflicts.len(), 1);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::default();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
