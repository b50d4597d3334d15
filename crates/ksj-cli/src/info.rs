//! Implementation of the `ksjpm list` and `ksjpm info` commands.

use anyhow::{Context, Result};
use ksj_pkg::{Dependency, Package, PackageManager};

/// Print every installed package.
pub fn list_installed(pm: &PackageManager) -> Result<()> {
    let installed = pm
        .installed_packages()
        .context("Failed to read the installed package index")?;

    if installed.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages ({}):", installed.len());
    for entry in &installed {
        let dev = if entry.dev { " (dev)" } else { "" };
        println!("  {}@{}{dev}", entry.name, entry.version);
    }
    Ok(())
}

/// Print the project manifest, or that of a named package.
pub fn print_info(pm: &PackageManager, name: Option<&str>) -> Result<()> {
    let package = pm.package_info(name).with_context(|| match name {
        Some(name) => format!("Failed to find package `{name}`"),
        None => String::from("Failed to read package.ksj"),
    })?;
    print!("{}", render_info(&package));
    Ok(())
}

fn render_info(package: &Package) -> String {
    let mut out = format!("{}@{}\n", package.name, package.version);
    if let Some(description) = &package.description {
        out.push_str(description);
        out.push('\n');
    }

    out.push('\n');
    if let Some(license) = &package.license {
        out.push_str(&format!("license: {license}\n"));
    }
    if let Some(main) = &package.main {
        out.push_str(&format!("main: {main}\n"));
    }

    if !package.authors.is_empty() {
        out.push_str("\nauthors:\n");
        for author in &package.authors {
            out.push_str(&format!("  {author}\n"));
        }
    }

    render_dependencies(&mut out, "dependencies", &package.dependencies);
    render_dependencies(&mut out, "dev_dependencies", &package.dev_dependencies);
    out
}

fn render_dependencies(out: &mut String, title: &str, deps: &[Dependency]) {
    if deps.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title}:\n"));
    for dep in deps {
        out.push_str(&format!("  {}: {}\n", dep.name, dep.constraint));
    }
}
