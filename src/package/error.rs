use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The version-control client could not materialize a locator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("fetch of {locator} exited with {status}: {stderr}")]
    Failed {
        locator: String,
        status: String,
        stderr: String,
    },
    #[error("destination {} already exists and is not empty", .0.display())]
    DestinationNotEmpty(PathBuf),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no package descriptor at {}", .0.display())]
    NotFound(PathBuf),
    #[error("{}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("{}: descriptor has no `name` field", .0.display())]
    MissingName(PathBuf),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("{}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
#[error("failed to write manifest {}: {source}", .path.display())]
pub struct PersistError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Why a single package subtree did not install.
///
/// These never escape the resolution boundary of the package they belong
/// to; the parent records them and moves on to its next dependency.
#[derive(Debug, Error)]
pub enum BranchError {
    #[error("could not create workspace: {0}")]
    Workspace(#[source] io::Error),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("installation cancelled")]
    Cancelled,
}
