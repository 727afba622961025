pub mod error;
pub mod fetcher;
pub mod installer;
pub mod session;
pub mod workspace;

pub use fetcher::{Fetcher, GitFetcher};
pub use installer::{InstallOptions, InstallOutcome, Installer};
