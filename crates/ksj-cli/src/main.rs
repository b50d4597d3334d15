//! ksjpm - package manager for the KingSejong programming language

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use ksj_pkg::{ManagerConfig, PackageManager, ProjectLayout};
use std::env;
use std::path::PathBuf;

mod add;
mod info;
mod init;
mod install;
mod remove;

#[derive(Parser)]
#[command(name = "ksjpm")]
#[command(version)]
#[command(about = "KingSejong Package Manager", long_about = None)]
struct Cli {
    /// Project directory (defaults to the nearest directory with a package.ksj)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a package.ksj in the project directory
    Init {
        /// Package name (defaults to directory name)
        name: Option<String>,

        /// Initial version
        version: Option<String>,

        /// Short description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Install every dependency listed in package.ksj
    Install {
        /// Skip dev-dependencies
        #[arg(long)]
        production: bool,
    },

    /// Install a package and add it to package.ksj
    Add {
        /// Package name (optionally with @requirement suffix, e.g., "stdlib@^1.0.0")
        package: String,

        /// Add as a development dependency
        #[arg(long)]
        dev: bool,
    },

    /// Install a package as a development dependency (same as `add --dev`)
    AddDev {
        /// Package name (optionally with @requirement suffix)
        package: String,
    },

    /// Uninstall a package and remove it from package.ksj
    Remove {
        /// Package name to remove
        package: String,
    },

    /// List installed packages
    List,

    /// Show information about the project or an installed package
    Info {
        /// Package name (defaults to the current project)
        package: Option<String>,
    },

    /// Resolve the dependency graph without installing anything
    Resolve {
        /// Fail if resolution produced any diagnostics
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Init {
            name,
            version,
            description,
        } => {
            let root = match cli.project {
                Some(dir) => dir,
                None => env::current_dir().context("Failed to get current directory")?,
            };
            let options = init::InitOptions {
                name,
                version,
                description,
            };
            init::init_project(&root, options)?;
        }

        Commands::Install { production } => {
            let config = load_config(cli.project)?.with_dev(!production);
            let mut pm = PackageManager::new(config);
            let report = install::install_dependencies(&mut pm)?;
            install::print_summary(&report);
        }

        Commands::Add { package, dev } => {
            let mut pm = PackageManager::new(load_config(cli.project)?);
            add::add_dependency(&mut pm, &add::AddOptions { package, dev })?;
        }

        Commands::AddDev { package } => {
            let mut pm = PackageManager::new(load_config(cli.project)?);
            add::add_dependency(&mut pm, &add::AddOptions { package, dev: true })?;
        }

        Commands::Remove { package } => {
            let mut pm = PackageManager::new(load_config(cli.project)?);
            remove::remove_dependency(&mut pm, &remove::RemoveOptions { package })?;
        }

        Commands::List => {
            let pm = PackageManager::new(load_config(cli.project)?);
            info::list_installed(&pm)?;
        }

        Commands::Info { package } => {
            let pm = PackageManager::new(load_config(cli.project)?);
            info::print_info(&pm, package.as_deref())?;
        }

        Commands::Resolve { strict } => {
            let mut pm = PackageManager::new(load_config(cli.project)?);
            install::resolve_project(&mut pm, strict)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Manager settings for the explicit project directory, or else the nearest
/// ancestor of the current directory holding a manifest.
fn load_config(explicit: Option<PathBuf>) -> Result<ManagerConfig> {
    let root = match explicit {
        Some(dir) => dir,
        None => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            ProjectLayout::find_root(&cwd).map_or(cwd, |layout| layout.root)
        }
    };
    Ok(ManagerConfig::from_env(root))
}
