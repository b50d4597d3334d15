//! Project initialization for `ksjpm init`.

use anyhow::{Context, Result};
use ksj_pkg::{ManagerConfig, PackageManager};
use std::path::Path;

/// Name used when none is given and the directory name is unusable.
const FALLBACK_NAME: &str = "my-package";

/// Version of a freshly initialized package.
const INITIAL_VERSION: &str = "1.0.0";

/// Options for project initialization.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Package name (defaults to directory name).
    pub name: Option<String>,

    /// Initial version.
    pub version: Option<String>,

    /// Short description.
    pub description: Option<String>,
}

/// Create a `package.ksj` in `root`.
pub fn init_project(root: &Path, options: InitOptions) -> Result<()> {
    let name = options.name.unwrap_or_else(|| infer_package_name(root));
    let version = options
        .version
        .unwrap_or_else(|| INITIAL_VERSION.to_string());

    let pm = PackageManager::new(ManagerConfig::new(root));
    let package = pm
        .init_package(&name, &version, options.description.as_deref())
        .with_context(|| format!("Failed to initialize package in {}", root.display()))?;

    println!("Created package `{}` v{}", package.name, package.version);
    Ok(())
}

/// Infer the package name from a directory.
fn infer_package_name(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(dir)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.chars().any(char::is_whitespace))
        .map_or_else(|| FALLBACK_NAME.to_string(), ToString::to_string)
}
