mod app;
mod model;
mod package;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use app::App;
use model::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "cpi",
    version,
    about = "Install git-hosted packages and their dependencies into a package manifest"
)]
struct Cli {
    /// Manifest to update (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    manifest: Option<PathBuf>,
    /// Directory for temporary checkouts (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install packages from repository URLs
    Install {
        /// Repository URLs to install
        #[arg(required_unless_present = "shortcut")]
        locators: Vec<String>,
        /// Install a configured shortcut by package name
        #[arg(long, short)]
        shortcut: Option<String>,
    },
    /// List the manifest's dependencies
    List,
    /// Show configured shortcuts and whether they are installed
    Shortcuts,
}

fn main() -> Result<ExitCode> {
    // Initialize logging to file (stdout carries command output)
    let log_dir = directories::ProjectDirs::from("", "", "cpi")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("cpi"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "cpi.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cpi=info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("cpi starting");

    let mut config = AppConfig::load()?;
    if let Some(path) = cli.manifest.as_deref() {
        config.set_manifest_path(path);
    }
    if let Some(path) = cli.scratch_dir.as_deref() {
        config.set_scratch_dir(path);
    }

    let mut app = App::new(config);
    let mut ok = true;

    match cli.command {
        Command::Install {
            locators,
            shortcut,
        } => {
            let mut results = Vec::new();
            if let Some(name) = shortcut {
                results.push(app.install_shortcut(&name)?);
            }
            for locator in &locators {
                results.push(app.install(locator));
            }

            for (outcome, notes) in results {
                ok &= outcome.success;
                for note in notes {
                    println!("{note}");
                }
            }
        }
        Command::List => {
            for line in app.list()? {
                println!("{line}");
            }
        }
        Command::Shortcuts => {
            for line in app.shortcuts()? {
                println!("{line}");
            }
        }
    }

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_requires_locator_or_shortcut() {
        assert!(Cli::try_parse_from(["cpi", "install"]).is_err());
        assert!(Cli::try_parse_from(["cpi", "install", "--shortcut", "tools"]).is_ok());

        let cli = Cli::try_parse_from([
            "cpi",
            "--manifest",
            "m.json",
            "install",
            "https://example.com/a.git",
            "https://example.com/b.git",
        ])
        .unwrap();
        assert_eq!(cli.manifest, Some(PathBuf::from("m.json")));
        match cli.command {
            Command::Install { locators, shortcut } => {
                assert_eq!(locators.len(), 2);
                assert!(shortcut.is_none());
            }
            _ => panic!("expected install"),
        }
    }
}
