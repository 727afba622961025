use std::path::Path;
use std::process::{Command, Stdio};

use crate::package::error::FetchError;

/// Materializes the content addressed by a locator into a local directory.
pub trait Fetcher {
    fn fetch(&self, locator: &str, destination: &Path) -> Result<(), FetchError>;
}

/// Fetches by running `git clone` as a subprocess.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    shallow: bool,
}

impl GitFetcher {
    pub fn new(program: impl Into<String>, shallow: bool) -> Self {
        Self {
            program: program.into(),
            shallow,
        }
    }

    fn clone_command(&self, locator: &str, destination: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("clone");
        if self.shallow {
            command.args(["--depth", "1"]);
        }
        command
            .arg("--")
            .arg(locator)
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        command
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new("git", false)
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, locator: &str, destination: &Path) -> Result<(), FetchError> {
        ensure_empty_destination(destination)?;

        tracing::debug!(
            "{} clone {locator} {}",
            self.program,
            destination.display()
        );
        let output = self
            .clone_command(locator, destination)
            .output()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::Failed {
                locator: locator.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!("{}", stdout.trim());
        }
        tracing::info!("cloned {locator} to {}", destination.display());
        Ok(())
    }
}

fn ensure_empty_destination(destination: &Path) -> Result<(), FetchError> {
    let occupied = std::fs::read_dir(destination)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    if occupied {
        return Err(FetchError::DestinationNotEmpty(destination.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=cpi", "-c", "user.email=cpi@localhost"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed");
    }

    fn local_repo(root: &Path) -> PathBuf {
        let repo = root.join("origin");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        std::fs::write(repo.join("package.json"), r#"{"name": "pkgA"}"#).unwrap();
        git(&repo, &["add", "package.json"]);
        git(&repo, &["commit", "-q", "-m", "init"]);
        repo
    }

    #[test]
    fn clones_local_repository() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let repo = local_repo(root.path());
        let destination = root.path().join("clone");

        GitFetcher::default()
            .fetch(repo.to_str().unwrap(), &destination)
            .unwrap();

        let descriptor = std::fs::read_to_string(destination.join("package.json")).unwrap();
        assert!(descriptor.contains("pkgA"));
    }

    #[test]
    fn failed_clone_surfaces_stderr() {
        if !git_available() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does-not-exist");

        let err = GitFetcher::default()
            .fetch(missing.to_str().unwrap(), &root.path().join("clone"))
            .unwrap_err();

        match err {
            FetchError::Failed { stderr, .. } => assert!(!stderr.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = GitFetcher::new("cpi-no-such-vcs-binary", false);

        let err = fetcher
            .fetch("repo://A", &root.path().join("clone"))
            .unwrap_err();

        assert!(matches!(err, FetchError::Spawn { .. }));
    }

    #[test]
    fn refuses_non_empty_destination() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("stale"), "x").unwrap();

        let err = GitFetcher::default()
            .fetch("repo://A", root.path())
            .unwrap_err();

        assert!(matches!(err, FetchError::DestinationNotEmpty(_)));
    }

    #[test]
    fn shallow_clone_passes_depth() {
        let fetcher = GitFetcher::new("git", true);
        let command = fetcher.clone_command("repo://A", Path::new("/tmp/x"));
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args, ["clone", "--depth", "1", "--", "repo://A", "/tmp/x"]);
    }
}
