//! Project-level package operations.
//!
//! [`PackageManager`] ties the manifest, registry, downloader, resolver and
//! installed index together for a single project directory.

use crate::config::ManagerConfig;
use crate::constraint::is_version_compatible;
use crate::fetch::{Downloader, FetchError, LocalDownloader};
use crate::index::{IndexEntry, IndexError, PackageIndex};
use crate::layout::{LayoutError, ProjectLayout};
use crate::manifest::{validate_name, Dependency, ManifestError, Package};
use crate::registry::PackageRegistry;
use crate::resolve::{Diagnostic, Resolution, Resolver};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Requirement recorded when a package is added without one.
pub const DEFAULT_REQUIREMENT: &str = "^1.0.0";

/// Errors that can occur during package manager operations.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("package.ksj already exists: {0}")]
    AlreadyInitialized(PathBuf),

    #[error("package '{0}' is not installed")]
    NotInstalled(String),
}

/// Outcome of installing a project's dependencies.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Packages recorded in the index, in resolution order.
    pub installed: Vec<IndexEntry>,
    /// Resolved dependencies no source could supply.
    pub missing: Vec<Dependency>,
    /// Installed packages whose version does not meet the selected
    /// requirement, paired with that requirement.
    pub unsatisfied: Vec<Dependency>,
    /// Diagnostics from resolution.
    pub diagnostics: Vec<Diagnostic>,
}

impl InstallReport {
    /// Returns true if every dependency was installed without diagnostics.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unsatisfied.is_empty() && self.diagnostics.is_empty()
    }
}

/// Package manager for one project.
pub struct PackageManager {
    config: ManagerConfig,
    layout: ProjectLayout,
    registry: PackageRegistry,
    downloader: Box<dyn Downloader>,
}

impl PackageManager {
    /// Create a manager that fetches packages from the project's modules
    /// directory.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        let layout = config.layout();
        let downloader = Box::new(LocalDownloader::new(&layout.modules_dir));
        Self::with_downloader(config, downloader)
    }

    /// Create a manager with a custom package source.
    #[must_use]
    pub fn with_downloader(config: ManagerConfig, downloader: Box<dyn Downloader>) -> Self {
        Self {
            layout: config.layout(),
            config,
            registry: PackageRegistry::new(),
            downloader,
        }
    }

    /// The project layout.
    #[must_use]
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Packages known to this manager.
    #[must_use]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// Create a new `package.ksj` in the project root.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest already exists, the name or version is
    /// invalid, or the file cannot be written.
    pub fn init_package(
        &self,
        name: &str,
        version: &str,
        description: Option<&str>,
    ) -> Result<Package, ManagerError> {
        if self.layout.has_manifest() {
            return Err(ManagerError::AlreadyInitialized(
                self.layout.manifest_path.clone(),
            ));
        }

        let mut package = Package::new(name, version);
        package.description = description
            .filter(|d| !d.is_empty())
            .map(ToString::to_string);

        // Round-trip through the parser so the new manifest is validated.
        let package = Package::from_json(&package.to_json()?)?;
        self.save_project_package(&package)?;
        info!(name, version, "initialized package");
        Ok(package)
    }

    /// Load the project manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or invalid.
    pub fn load_project_package(&self) -> Result<Package, ManagerError> {
        Ok(Package::from_path(&self.layout.manifest_path)?)
    }

    /// Write the project manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be written.
    pub fn save_project_package(&self, package: &Package) -> Result<(), ManagerError> {
        Ok(package.write(&self.layout.manifest_path)?)
    }

    /// Install a runtime dependency and record it in the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be obtained or the index or
    /// manifest cannot be updated.
    pub fn install_package(
        &mut self,
        name: &str,
        requirement: Option<&str>,
    ) -> Result<Package, ManagerError> {
        self.install(name, requirement, false)
    }

    /// Install a development dependency and record it in the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be obtained or the index or
    /// manifest cannot be updated.
    pub fn install_dev_package(
        &mut self,
        name: &str,
        requirement: Option<&str>,
    ) -> Result<Package, ManagerError> {
        self.install(name, requirement, true)
    }

    fn install(
        &mut self,
        name: &str,
        requirement: Option<&str>,
        dev: bool,
    ) -> Result<Package, ManagerError> {
        validate_name(name)?;
        let requirement = requirement
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REQUIREMENT);

        let package = self.obtain(name, requirement)?;

        let mut index = self.load_index()?;
        index.insert(IndexEntry::for_package(&package, requirement, dev)?);
        self.save_index(&index)?;

        if self.layout.has_manifest() {
            let mut project = self.load_project_package()?;
            let dep = Dependency::new(name, requirement);
            if dev {
                project.add_dev_dependency(dep);
            } else {
                project.add_dependency(dep);
            }
            self.save_project_package(&project)?;
        } else {
            debug!(package = name, "no project manifest, not recording dependency");
        }

        info!(package = name, version = %package.version, dev, "installed");
        Ok(package)
    }

    /// Remove a package from the registry, index, manifest and modules
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is neither registered nor indexed, or
    /// if any of the files cannot be updated.
    pub fn uninstall_package(&mut self, name: &str) -> Result<(), ManagerError> {
        validate_name(name)?;

        let mut index = self.load_index()?;
        let registered = self.registry.remove(name).is_some();
        let indexed = index.remove(name).is_some();
        if !registered && !indexed {
            return Err(ManagerError::NotInstalled(name.to_string()));
        }

        if indexed {
            self.save_index(&index)?;
        }

        if self.layout.has_manifest() {
            let mut project = self.load_project_package()?;
            if project.remove_dependency(name) {
                self.save_project_package(&project)?;
            }
        }

        let module_dir = self.layout.module_dir(name);
        if module_dir.exists() {
            fs::remove_dir_all(&module_dir)?;
        }

        info!(package = name, "uninstalled");
        Ok(())
    }

    /// Resolve the project's dependency graph without installing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the project manifest cannot be loaded.
    pub fn resolve_project(&mut self) -> Result<Resolution, ManagerError> {
        let root = self.load_project_package()?;
        Ok(self.resolve(&root))
    }

    fn resolve(&mut self, root: &Package) -> Resolution {
        Resolver::new(self.downloader.as_ref())
            .with_dev(self.config.include_dev)
            .with_max_depth(self.config.max_depth)
            .resolve(root, &mut self.registry)
    }

    /// Resolve the project and record every obtainable package in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the project manifest cannot be loaded or the index
    /// cannot be written. Unobtainable packages are reported, not errors.
    pub fn install_dependencies(&mut self) -> Result<InstallReport, ManagerError> {
        let root = self.load_project_package()?;
        let resolution = self.resolve(&root);

        let mut index = self.load_index()?;
        let mut report = InstallReport {
            diagnostics: resolution.diagnostics.clone(),
            ..InstallReport::default()
        };

        for (position, dep) in resolution.resolved.iter().enumerate() {
            let requirement = resolution
                .selection(&dep.name)
                .unwrap_or(&dep.constraint);

            let Some(package) = self.registry.lookup(&dep.name) else {
                report.missing.push(dep.clone());
                continue;
            };

            if !is_version_compatible(requirement, &package.version) {
                warn!(
                    package = %dep.name,
                    version = %package.version,
                    requirement,
                    "installed version does not satisfy the selected requirement"
                );
                report
                    .unsatisfied
                    .push(Dependency::new(dep.name.clone(), requirement));
            }

            let dev = position >= resolution.dev_start;
            let entry = IndexEntry::for_package(package, requirement, dev)?;
            index.insert(entry.clone());
            report.installed.push(entry);
        }

        self.save_index(&index)?;
        info!(
            installed = report.installed.len(),
            missing = report.missing.len(),
            unsatisfied = report.unsatisfied.len(),
            diagnostics = report.diagnostics.len(),
            "installed dependencies"
        );
        Ok(report)
    }

    /// Manifest of the project, or of a named package.
    ///
    /// A named package is looked up in the registry first, then obtained
    /// from the package source.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be found or loaded.
    pub fn package_info(&self, name: Option<&str>) -> Result<Package, ManagerError> {
        let Some(name) = name else {
            return self.load_project_package();
        };

        if let Some(package) = self.registry.lookup(name) {
            return Ok(package.clone());
        }

        let index = self.load_index()?;
        let requirement = index
            .get(name)
            .map_or(DEFAULT_REQUIREMENT, |e| e.requirement.as_str());

        match self.downloader.fetch(name, requirement) {
            Ok(package) => Ok(package),
            Err(err) if err.is_not_found() => Err(ManagerError::NotInstalled(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Installed packages in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn installed_packages(&self) -> Result<Vec<IndexEntry>, ManagerError> {
        Ok(self.load_index()?.iter().cloned().collect())
    }

    fn obtain(&mut self, name: &str, requirement: &str) -> Result<Package, ManagerError> {
        if let Some(package) = self.registry.lookup(name) {
            return Ok(package.clone());
        }
        let package = self.downloader.fetch(name, requirement)?;
        self.registry.register(package.clone());
        Ok(package)
    }

    fn load_index(&self) -> Result<PackageIndex, ManagerError> {
        Ok(PackageIndex::load(&self.layout.index_path())?)
    }

    fn save_index(&self, index: &PackageIndex) -> Result<(), ManagerError> {
        self.layout.ensure_modules_dir()?;
        Ok(index.save(&self.layout.index_path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> PackageManager {
        PackageManager::new(ManagerConfig::new(dir.path()))
    }

    fn write_module(dir: &TempDir, name: &str, json: &str) {
        let module = dir.path().join("node_modules").join(name);
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("package.ksj"), json).unwrap();
    }

    #[test]
    fn test_init_package() {
        let dir = TempDir::new().unwrap();
        let pm = manager(&dir);

        let pkg = pm
            .init_package("my-project", "0.1.0", Some("A test project"))
            .unwrap();
        assert_eq!(pkg.license.as_deref(), Some("MIT"));
        assert_eq!(pkg.main.as_deref(), Some("index.ksj"));

        let loaded = pm.load_project_package().unwrap();
        assert_eq!(loaded.name, "my-project");
        assert_eq!(loaded.description.as_deref(), Some("A test project"));
    }

    #[test]
    fn test_init_package_twice_fails() {
        let dir = TempDir::new().unwrap();
        let pm = manager(&dir);
        pm.init_package("app", "1.0.0", None).unwrap();

        let err = pm.init_package("app", "1.0.0", None).unwrap_err();
        assert!(matches!(err, ManagerError::AlreadyInitialized(_)));
    }

    #[test]
    fn test_init_package_rejects_bad_version() {
        let dir = TempDir::new().unwrap();
        let pm = manager(&dir);
        let err = pm.init_package("app", "one", None).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Manifest(ManifestError::InvalidVersion(..))
        ));
        assert!(!pm.layout().has_manifest());
    }

    #[test]
    fn test_install_stdlib_records_dependency() {
        let dir = TempDir::new().unwrap();
        let mut pm = manager(&dir);
        pm.init_package("app", "1.0.0", None).unwrap();

        let pkg = pm.install_package("stdlib", None).unwrap();
        assert_eq!(pkg.version, "1.0.0");
        assert!(pm.registry().contains("stdlib"));

        let project = pm.load_project_package().unwrap();
        assert_eq!(project.dependencies, vec![Dependency::new("stdlib", "^1.0.0")]);

        let installed = pm.installed_packages().unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].requirement, "^1.0.0");
        assert!(!installed[0].dev);
    }

    #[test]
    fn test_install_dev_package() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "tester", r#"{ "name": "tester", "version": "0.3.0" }"#);
        let mut pm = manager(&dir);
        pm.init_package("app", "1.0.0", None).unwrap();

        pm.install_dev_package("tester", Some("~0.3.0")).unwrap();

        let project = pm.load_project_package().unwrap();
        assert!(project.dependencies.is_empty());
        assert_eq!(
            project.dev_dependencies,
            vec![Dependency::new("tester", "~0.3.0")]
        );
        assert!(pm.installed_packages().unwrap()[0].dev);
    }

    #[test]
    fn test_install_missing_package_fails() {
        let dir = TempDir::new().unwrap();
        let mut pm = manager(&dir);
        pm.init_package("app", "1.0.0", None).unwrap();

        let err = pm.install_package("ghost", None).unwrap_err();
        assert!(matches!(err, ManagerError::Fetch(ref e) if e.is_not_found()));
        assert!(pm.load_project_package().unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_install_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let mut pm = manager(&dir);
        let err = pm.install_package("../escape", None).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Manifest(ManifestError::InvalidName(..))
        ));
    }

    #[test]
    fn test_uninstall_package() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "http", r#"{ "name": "http", "version": "2.0.0" }"#);
        let mut pm = manager(&dir);
        pm.init_package("app", "1.0.0", None).unwrap();
        pm.install_package("http", Some("^2.0.0")).unwrap();

        pm.uninstall_package("http").unwrap();

        assert!(!pm.registry().contains("http"));
        assert!(pm.installed_packages().unwrap().is_empty());
        assert!(pm.load_project_package().unwrap().dependencies.is_empty());
        assert!(!dir.path().join("node_modules/http").exists());
    }

    #[test]
    fn test_uninstall_unknown_package() {
        let dir = TempDir::new().unwrap();
        let mut pm = manager(&dir);
        let err = pm.uninstall_package("nothing").unwrap_err();
        assert!(matches!(err, ManagerError::NotInstalled(ref n) if n == "nothing"));
    }

    #[test]
    fn test_install_dependencies_report() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "http",
            r#"{ "name": "http", "version": "2.0.0", "dependencies": { "stdlib": "^1.0.0", "ghost": "1.0.0" } }"#,
        );
        let mut pm = manager(&dir);
        let mut project = Package::new("app", "1.0.0");
        project.add_dependency(Dependency::new("http", "^2.0.0"));
        project.add_dev_dependency(Dependency::new("stdlib", "^1.0.0"));
        pm.save_project_package(&project).unwrap();

        let report = pm.install_dependencies().unwrap();

        let installed: Vec<_> = report.installed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(installed, ["http", "stdlib"]);
        assert!(report.installed.iter().all(|e| !e.dev));
        assert_eq!(report.missing, vec![Dependency::new("ghost", "1.0.0")]);
        assert!(report.unsatisfied.is_empty());
        assert!(report.diagnostics.is_empty());
        assert!(!report.is_complete());

        let index: Vec<_> = pm
            .installed_packages()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(index, ["http", "stdlib"]);
    }

    #[test]
    fn test_runtime_dependency_listed_as_dev_is_not_dev() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "http",
            r#"{ "name": "http", "version": "2.0.0", "dependencies": { "stdlib": "^1.0.0" } }"#,
        );
        let mut project = Package::new("app", "1.0.0");
        project.add_dependency(Dependency::new("http", "^2.0.0"));
        project.add_dev_dependency(Dependency::new("stdlib", "^1.0.0"));

        for include_dev in [true, false] {
            let config = ManagerConfig::new(dir.path()).with_dev(include_dev);
            let mut pm = PackageManager::new(config);
            pm.save_project_package(&project).unwrap();

            let report = pm.install_dependencies().unwrap();
            let flags: Vec<_> = report
                .installed
                .iter()
                .map(|e| (e.name.as_str(), e.dev))
                .collect();
            assert_eq!(flags, [("http", false), ("stdlib", false)]);
        }
    }

    #[test]
    fn test_dev_only_dependency_is_dev() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "tester", r#"{ "name": "tester", "version": "1.0.0" }"#);
        let mut pm = manager(&dir);
        let mut project = Package::new("app", "1.0.0");
        project.add_dependency(Dependency::new("stdlib", "^1.0.0"));
        project.add_dev_dependency(Dependency::new("tester", "^1.0.0"));
        pm.save_project_package(&project).unwrap();

        let report = pm.install_dependencies().unwrap();
        let flags: Vec<_> = report
            .installed
            .iter()
            .map(|e| (e.name.as_str(), e.dev))
            .collect();
        assert_eq!(flags, [("stdlib", false), ("tester", true)]);
    }

    #[test]
    fn test_conflict_reports_unsatisfied_selection() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "a",
            r#"{ "name": "a", "version": "1.0.0", "dependencies": { "c": "^1.0.0" } }"#,
        );
        write_module(
            &dir,
            "b",
            r#"{ "name": "b", "version": "1.0.0", "dependencies": { "c": "^1.5.0" } }"#,
        );
        write_module(&dir, "c", r#"{ "name": "c", "version": "1.0.0" }"#);
        let mut pm = manager(&dir);
        let mut project = Package::new("app", "1.0.0");
        project.add_dependency(Dependency::new("a", "^1.0.0"));
        project.add_dependency(Dependency::new("b", "^1.0.0"));
        pm.save_project_package(&project).unwrap();

        let report = pm.install_dependencies().unwrap();

        assert_eq!(report.unsatisfied, vec![Dependency::new("c", "^1.5.0")]);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(!report.is_complete());
        let c = report.installed.iter().find(|e| e.name == "c").unwrap();
        assert_eq!(c.version, "1.0.0");
        assert_eq!(c.requirement, "^1.5.0");
    }

    #[test]
    fn test_install_dependencies_without_manifest() {
        let dir = TempDir::new().unwrap();
        let mut pm = manager(&dir);
        let err = pm.install_dependencies().unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Manifest(ManifestError::NotFound(_))
        ));
    }

    #[test]
    fn test_package_info() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "json",
            r#"{ "name": "json", "version": "1.2.0", "description": "JSON codec" }"#,
        );
        let pm = manager(&dir);
        pm.init_package("app", "1.0.0", None).unwrap();

        assert_eq!(pm.package_info(None).unwrap().name, "app");
        assert_eq!(
            pm.package_info(Some("json")).unwrap().description.as_deref(),
            Some("JSON codec")
        );
        assert_eq!(pm.package_info(Some("stdlib")).unwrap().name, "stdlib");
        assert!(matches!(
            pm.package_info(Some("ghost")).unwrap_err(),
            ManagerError::NotInstalled(_)
        ));
    }
}
