//! Implementation of the `ksjpm install` and `ksjpm resolve` commands.

use anyhow::{bail, Context, Result};
use ksj_pkg::{InstallReport, PackageManager, Resolution};

/// Install every dependency of the project.
pub fn install_dependencies(pm: &mut PackageManager) -> Result<InstallReport> {
    let project = pm
        .load_project_package()
        .context("Failed to read package.ksj")?;
    println!("Installing dependencies for {} v{}", project.name, project.version);

    pm.install_dependencies()
        .context("Failed to install dependencies")
}

/// Print a summary of an install run.
pub fn print_summary(report: &InstallReport) {
    if report.installed.is_empty() && report.missing.is_empty() {
        println!("No dependencies to install.");
    }

    if !report.installed.is_empty() {
        println!("Installed:");
        for entry in &report.installed {
            let dev = if entry.dev { " (dev)" } else { "" };
            println!("  + {}@{} ({}){dev}", entry.name, entry.version, entry.requirement);
        }
    }

    if !report.missing.is_empty() {
        println!("Not found:");
        for dep in &report.missing {
            println!("  ? {dep}");
        }
    }

    if !report.unsatisfied.is_empty() {
        println!("Installed version does not satisfy:");
        for dep in &report.unsatisfied {
            println!("  ~ {dep}");
        }
    }

    print_diagnostics(&report.diagnostics);
}

/// Resolve the project and print the result.
pub fn resolve_project(pm: &mut PackageManager, strict: bool) -> Result<()> {
    let resolution = pm
        .resolve_project()
        .context("Failed to resolve dependencies")?;
    print_resolution(&resolution);

    if strict && !resolution.is_clean() {
        bail!(
            "resolution produced {} diagnostic(s)",
            resolution.diagnostics.len()
        );
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    if resolution.is_empty() {
        println!("No dependencies.");
    }

    for dep in &resolution.resolved {
        match resolution.selection(&dep.name) {
            Some(selected) if selected != dep.constraint => {
                println!("  {} {} -> {selected}", dep.name, dep.constraint);
            }
            _ => println!("  {} {}", dep.name, dep.constraint),
        }
    }

    print_diagnostics(&resolution.diagnostics);
}

fn print_diagnostics(diagnostics: &[ksj_pkg::Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    println!("Warnings:");
    for diagnostic in diagnostics {
        println!("  ! {diagnostic}");
    }
}
