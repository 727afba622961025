use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const CHECKOUT_DIR: &str = "checkout";

/// Scratch directory holding exactly one fetched package.
///
/// The backing directory is removed when the value is dropped, so every
/// exit path out of a package's resolution releases it. `close` does the
/// same but reports removal failures instead of swallowing them.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(scratch_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(scratch_dir)?;
        let dir = tempfile::Builder::new()
            .prefix("cpi-")
            .tempdir_in(scratch_dir)?;
        Ok(Self { dir })
    }

    /// Destination handed to the fetcher. It does not exist until the
    /// fetch creates it.
    pub fn checkout(&self) -> PathBuf {
        self.dir.path().join(CHECKOUT_DIR)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|err| {
            io::Error::new(err.kind(), format!("{}: {err}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let root = {
            let workspace = Workspace::create(scratch.path()).unwrap();
            std::fs::create_dir_all(workspace.checkout()).unwrap();
            std::fs::write(workspace.checkout().join("file.txt"), "x").unwrap();
            workspace.root().to_path_buf()
        };

        assert!(!root.exists());
    }

    #[test]
    fn close_removes_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(scratch.path()).unwrap();
        let root = workspace.root().to_path_buf();
        assert!(root.starts_with(scratch.path()));
        assert!(!workspace.checkout().exists());

        workspace.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn create_makes_missing_scratch_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let nested = scratch.path().join("a/b");
        let first = Workspace::create(&nested).unwrap();
        let second = Workspace::create(&nested).unwrap();
        assert_ne!(first.root(), second.root());
    }
}
