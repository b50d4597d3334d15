//! Implementation of the `ksjpm remove` command.

use anyhow::{Context, Result};
use ksj_pkg::PackageManager;

/// Options for removing a dependency.
#[derive(Debug)]
pub struct RemoveOptions {
    /// Package name to remove.
    pub package: String,
}

/// Uninstall a package and drop it from the project manifest.
pub fn remove_dependency(pm: &mut PackageManager, options: &RemoveOptions) -> Result<()> {
    let name = &options.package;
    pm.uninstall_package(name)
        .with_context(|| format!("Failed to remove `{name}`"))?;
    println!("Removed `{name}`");
    Ok(())
}
