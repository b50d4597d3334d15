//! Implementation of the `ksjpm add` command.

use anyhow::{bail, Context, Result};
use ksj_pkg::PackageManager;

/// Options for adding a dependency.
#[derive(Debug)]
pub struct AddOptions {
    /// Package name, optionally with an `@requirement` suffix.
    pub package: String,
    /// Add to `dev_dependencies` instead of `dependencies`.
    pub dev: bool,
}

/// Parse a package specification like "name" or "name@requirement".
///
/// Splits at the first `@` after the first character, so a leading `@` stays
/// part of the name.
fn parse_package_spec(spec: &str) -> (String, Option<String>) {
    match spec.char_indices().skip(1).find(|&(_, c)| c == '@') {
        Some((at_pos, _)) => {
            let name = &spec[..at_pos];
            let requirement = &spec[at_pos + 1..];
            if requirement.is_empty() {
                (name.to_string(), None)
            } else {
                (name.to_string(), Some(requirement.to_string()))
            }
        }
        None => (spec.to_string(), None),
    }
}

/// Install a package and record it in the project manifest.
pub fn add_dependency(pm: &mut PackageManager, options: &AddOptions) -> Result<()> {
    if !pm.layout().has_manifest() {
        bail!(
            "No {} found in {}. Run `ksjpm init` first.",
            ksj_pkg::MANIFEST_FILE,
            pm.layout().root.display()
        );
    }

    let (name, requirement) = parse_package_spec(&options.package);
    let action = if pm.load_project_package()?.find_dependency(&name).is_some() {
        "Updated"
    } else {
        "Added"
    };

    let package = if options.dev {
        pm.install_dev_package(&name, requirement.as_deref())
    } else {
        pm.install_package(&name, requirement.as_deref())
    }
    .with_context(|| format!("Failed to install `{name}`"))?;

    let section = if options.dev {
        "dev_dependencies"
    } else {
        "dependencies"
    };
    println!("{action} `{name}` v{} to {section}", package.version);

    Ok(())
}
