//! Dependency resolution for KingSejong packages.
//!
//! The resolver walks a root package's dependency graph depth first. It never
//! fails on an individual dependency: conflicts are settled by picking the
//! higher requirement, unobtainable packages are skipped, and deep chains are
//! cut off. Everything noteworthy is reported as a [`Diagnostic`] alongside
//! the resolved set.

use crate::constraint::{is_version_compatible, requirement_base};
use crate::fetch::{Downloader, FetchError};
use crate::manifest::{Dependency, Package};
use crate::registry::PackageRegistry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Default bound on how deep the resolver descends.
pub const MAX_DEPTH: usize = 100;

/// Something the resolver recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two incompatible requirements for the same package.
    Conflict {
        package: String,
        existing: String,
        requested: String,
        chosen: String,
    },

    /// A branch was abandoned because it went past the depth bound.
    DepthExceeded { package: String, depth: usize },

    /// A package exists but its manifest could not be used.
    ManifestUnavailable {
        package: String,
        requirement: String,
        reason: String,
    },
}

impl Diagnostic {
    /// The package this diagnostic is about.
    #[must_use]
    pub fn package(&self) -> &str {
        match self {
            Self::Conflict { package, .. }
            | Self::DepthExceeded { package, .. }
            | Self::ManifestUnavailable { package, .. } => package,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict {
                package,
                existing,
                requested,
                chosen,
            } => write!(
                f,
                "version conflict for '{package}': '{existing}' vs '{requested}', using '{chosen}'"
            ),
            Self::DepthExceeded { package, depth } => write!(
                f,
                "circular or excessively deep dependency tree at '{package}' (depth {depth})"
            ),
            Self::ManifestUnavailable {
                package,
                requirement,
                reason,
            } => write!(
                f,
                "could not load manifest for '{package}@{requirement}': {reason}"
            ),
        }
    }
}

/// The result of a resolution run.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Dependencies in the order they were first seen.
    pub resolved: Vec<Dependency>,
    /// Position in `resolved` where entries first reached from the root's
    /// dev-dependencies begin.
    pub dev_start: usize,
    /// The requirement finally selected for each package name.
    pub selections: BTreeMap<String, String>,
    /// Everything the resolver recovered from, in traversal order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Returns true if no dependencies were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Returns the number of resolved dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// The selected requirement for a package.
    #[must_use]
    pub fn selection(&self, name: &str) -> Option<&str> {
        self.selections.get(name).map(String::as_str)
    }

    /// Returns true if the run produced no diagnostics.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Dependencies first reached through the root's runtime dependencies.
    #[must_use]
    pub fn runtime(&self) -> &[Dependency] {
        &self.resolved[..self.dev_start.min(self.resolved.len())]
    }

    /// Dependencies reached only through the root's dev-dependencies.
    #[must_use]
    pub fn dev_only(&self) -> &[Dependency] {
        &self.resolved[self.dev_start.min(self.resolved.len())..]
    }

    /// Conflict diagnostics only.
    pub fn conflicts(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Conflict { .. }))
    }
}

/// Mutable state of a single resolution run.
#[derive(Default)]
struct ResolutionContext {
    resolved_versions: HashMap<String, String>,
    resolved_list: Vec<Dependency>,
    visited: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolutionContext {
    fn into_resolution(self, dev_start: usize) -> Resolution {
        Resolution {
            resolved: self.resolved_list,
            dev_start,
            selections: self.resolved_versions.into_iter().collect(),
            diagnostics: self.diagnostics,
        }
    }
}

/// Dependency resolver for KingSejong packages.
pub struct Resolver<'a> {
    downloader: &'a dyn Downloader,
    /// Whether to traverse the root package's dev-dependencies.
    include_dev: bool,
    /// Deepest level whose dependencies are still traversed.
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    /// Create a resolver that fetches unknown packages through `downloader`.
    #[must_use]
    pub fn new(downloader: &'a dyn Downloader) -> Self {
        Self {
            downloader,
            include_dev: true,
            max_depth: MAX_DEPTH,
        }
    }

    /// Include the root package's dev-dependencies in resolution.
    #[must_use]
    pub fn with_dev(mut self, include: bool) -> Self {
        self.include_dev = include;
        self
    }

    /// Set the depth bound.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve the dependency graph of `root`.
    ///
    /// Packages obtained from the downloader are registered in `registry`.
    pub fn resolve(&self, root: &Package, registry: &mut PackageRegistry) -> Resolution {
        let mut ctx = ResolutionContext::default();

        for dep in &root.dependencies {
            self.visit(dep, 1, &mut ctx, registry);
        }

        let dev_start = ctx.resolved_list.len();
        if self.include_dev {
            for dep in &root.dev_dependencies {
                self.visit(dep, 1, &mut ctx, registry);
            }
        }

        ctx.into_resolution(dev_start)
    }

    fn visit(
        &self,
        dep: &Dependency,
        depth: usize,
        ctx: &mut ResolutionContext,
        registry: &mut PackageRegistry,
    ) {
        if !ctx.visited.insert(dep.key()) {
            return;
        }

        if let Some(existing) = ctx.resolved_versions.get(&dep.name).cloned() {
            if existing != dep.constraint {
                Self::reconcile(dep, &existing, ctx);
            }
            return;
        }

        debug!(package = %dep.name, requirement = %dep.constraint, depth, "resolving");
        ctx.resolved_versions
            .insert(dep.name.clone(), dep.constraint.clone());
        ctx.resolved_list.push(dep.clone());

        let Some(children) = self.obtain(dep, ctx, registry) else {
            return;
        };
        if children.is_empty() {
            return;
        }

        if depth >= self.max_depth {
            warn!(package = %dep.name, depth, "dependency tree too deep, not descending");
            ctx.diagnostics.push(Diagnostic::DepthExceeded {
                package: dep.name.clone(),
                depth,
            });
            return;
        }

        for child in &children {
            self.visit(child, depth + 1, ctx, registry);
        }
    }

    /// Settle a second, different requirement for an already resolved name.
    fn reconcile(dep: &Dependency, existing: &str, ctx: &mut ResolutionContext) {
        if is_version_compatible(&dep.constraint, existing) {
            debug!(
                package = %dep.name,
                requirement = %dep.constraint,
                selected = existing,
                "already satisfied"
            );
            return;
        }

        let requested_is_higher = match (requirement_base(&dep.constraint), requirement_base(existing)) {
            (Ok(requested), Ok(current)) => requested > current,
            _ => false,
        };
        let chosen = if requested_is_higher {
            dep.constraint.clone()
        } else {
            existing.to_string()
        };

        warn!(
            package = %dep.name,
            existing,
            requested = %dep.constraint,
            chosen = %chosen,
            "version conflict"
        );

        ctx.resolved_versions
            .insert(dep.name.clone(), chosen.clone());
        ctx.diagnostics.push(Diagnostic::Conflict {
            package: dep.name.clone(),
            existing: existing.to_string(),
            requested: dep.constraint.clone(),
            chosen,
        });
    }

    /// Runtime dependencies of `dep`'s manifest, or `None` if the manifest
    /// cannot be obtained.
    fn obtain(
        &self,
        dep: &Dependency,
        ctx: &mut ResolutionContext,
        registry: &mut PackageRegistry,
    ) -> Option<Vec<Dependency>> {
        if let Some(package) = registry.lookup(&dep.name) {
            return Some(package.dependencies.clone());
        }

        match self.downloader.fetch(&dep.name, &dep.constraint) {
            Ok(package) => {
                let children = package.dependencies.clone();
                registry.register(package);
                Some(children)
            }
            Err(FetchError::NotFound { .. }) => {
                debug!(package = %dep.name, "package not found, skipping");
                None
            }
            Err(err) => {
                warn!(package = %dep.name, error = %err, "skipping package");
                ctx.diagnostics.push(Diagnostic::ManifestUnavailable {
                    package: dep.name.clone(),
                    requirement: dep.constraint.clone(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestError;

    /// Serves packages from memory; names in `broken` fail with a manifest error.
    #[derive(Default)]
    struct MapDownloader {
        packages: HashMap<String, Package>,
        broken: HashSet<String>,
    }

    impl MapDownloader {
        fn with(mut self, name: &str, deps: &[(&str, &str)]) -> Self {
            let mut pkg = Package::new(name, "1.0.0");
            for (dep, req) in deps {
                pkg.add_dependency(Dependency::new(*dep, *req));
            }
            self.packages.insert(name.to_string(), pkg);
            self
        }

        fn with_package(mut self, pkg: Package) -> Self {
            self.packages.insert(pkg.name.clone(), pkg);
            self
        }

        fn with_broken(mut self, name: &str) -> Self {
            self.broken.insert(name.to_string());
            self
        }
    }

    impl Downloader for MapDownloader {
        fn fetch(&self, name: &str, _constraint: &str) -> Result<Package, FetchError> {
            if self.broken.contains(name) {
                return Err(FetchError::Manifest {
                    name: name.to_string(),
                    source: ManifestError::MissingField("version"),
                });
            }
            self.packages
                .get(name)
                .cloned()
                .ok_or_else(|| FetchError::NotFound {
                    name: name.to_string(),
                })
        }
    }

    fn root(deps: &[(&str, &str)]) -> Package {
        let mut pkg = Package::new("root", "1.0.0");
        for (dep, req) in deps {
            pkg.add_dependency(Dependency::new(*dep, *req));
        }
        pkg
    }

    fn names(resolution: &Resolution) -> Vec<&str> {
        resolution.resolved.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_resolve_empty() {
        let downloader = MapDownloader::default();
        let mut registry = PackageRegistry::new();
        let resolution = Resolver::new(&downloader).resolve(&root(&[]), &mut registry);
        assert!(resolution.is_empty());
        assert!(resolution.is_clean());
    }

    #[test]
    fn test_resolve_transitive() {
        let downloader = MapDownloader::default()
            .with("http", &[("url", "^1.0.0")])
            .with("url", &[]);
        let mut registry = PackageRegistry::new();

        let resolution =
            Resolver::new(&downloader).resolve(&root(&[("http", "^1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["http", "url"]);
        assert_eq!(resolution.selection("url"), Some("^1.0.0"));
        assert!(registry.contains("http"));
        assert!(registry.contains("url"));
    }

    #[test]
    fn test_conflict_higher_requirement_wins() {
        let downloader = MapDownloader::default()
            .with("a", &[("c", "^1.0.0")])
            .with("b", &[("c", "^1.5.0")])
            .with("c", &[]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader).resolve(
            &root(&[("a", "^1.0.0"), ("b", "^1.0.0")]),
            &mut registry,
        );

        assert_eq!(names(&resolution), ["a", "c", "b"]);
        assert_eq!(resolution.selection("c"), Some("^1.5.0"));
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::Conflict {
                package: "c".into(),
                existing: "^1.0.0".into(),
                requested: "^1.5.0".into(),
                chosen: "^1.5.0".into(),
            }]
        );
    }

    #[test]
    fn test_compatible_second_requirement_keeps_selection() {
        let downloader = MapDownloader::default()
            .with("a", &[("c", "^1.5.0")])
            .with("b", &[("c", "^1.0.0")])
            .with("c", &[]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader).resolve(
            &root(&[("a", "^1.0.0"), ("b", "^1.0.0")]),
            &mut registry,
        );

        assert_eq!(resolution.selection("c"), Some("^1.5.0"));
        assert!(resolution.is_clean());
    }

    #[test]
    fn test_conflict_lower_requirement_keeps_existing() {
        let downloader = MapDownloader::default()
            .with("a", &[("c", "^2.0.0")])
            .with("b", &[("c", "^1.0.0")]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader).resolve(
            &root(&[("a", "1.0.0"), ("b", "1.0.0")]),
            &mut registry,
        );

        assert_eq!(resolution.selection("c"), Some("^2.0.0"));
        assert_eq!(resolution.conflicts().count(), 1);
        assert!(matches!(
            &resolution.diagnostics[0],
            Diagnostic::Conflict { chosen, .. } if chosen == "^2.0.0"
        ));
    }

    #[test]
    fn test_cycle_terminates() {
        let downloader = MapDownloader::default()
            .with("a", &[("b", "^1.0.0")])
            .with("b", &[("a", "^1.0.0")]);
        let mut registry = PackageRegistry::new();

        let resolution =
            Resolver::new(&downloader).resolve(&root(&[("a", "^1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["a", "b"]);
        assert!(resolution.is_clean());
    }

    #[test]
    fn test_missing_package_is_skipped() {
        let downloader = MapDownloader::default().with("a", &[("ghost", "^1.0.0")]);
        let mut registry = PackageRegistry::new();

        let resolution =
            Resolver::new(&downloader).resolve(&root(&[("a", "^1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["a", "ghost"]);
        assert!(resolution.is_clean());
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn test_broken_manifest_is_reported() {
        let downloader = MapDownloader::default()
            .with("a", &[("bad", "^1.0.0"), ("ok", "^1.0.0")])
            .with("ok", &[])
            .with_broken("bad");
        let mut registry = PackageRegistry::new();

        let resolution =
            Resolver::new(&downloader).resolve(&root(&[("a", "^1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["a", "bad", "ok"]);
        assert_eq!(resolution.diagnostics.len(), 1);
        assert!(matches!(
            &resolution.diagnostics[0],
            Diagnostic::ManifestUnavailable { package, .. } if package == "bad"
        ));
    }

    #[test]
    fn test_depth_bound() {
        let downloader = MapDownloader::default()
            .with("p1", &[("p2", "1.0.0")])
            .with("p2", &[("p3", "1.0.0")])
            .with("p3", &[("p4", "1.0.0")])
            .with("p4", &[("p5", "1.0.0")])
            .with("p5", &[]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader)
            .with_max_depth(3)
            .resolve(&root(&[("p1", "1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["p1", "p2", "p3"]);
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::DepthExceeded {
                package: "p3".into(),
                depth: 3,
            }]
        );
    }

    #[test]
    fn test_chain_at_depth_bound_is_clean() {
        let downloader = MapDownloader::default()
            .with("p1", &[("p2", "1.0.0")])
            .with("p2", &[]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader)
            .with_max_depth(2)
            .resolve(&root(&[("p1", "1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["p1", "p2"]);
        assert!(resolution.is_clean());
    }

    #[test]
    fn test_dev_dependencies() {
        let mut lib = Package::new("lib", "1.0.0");
        lib.add_dependency(Dependency::new("core", "^1.0.0"));
        lib.add_dev_dependency(Dependency::new("lib-tester", "^1.0.0"));

        let downloader = MapDownloader::default()
            .with_package(lib)
            .with("core", &[])
            .with("lib-tester", &[])
            .with("tester", &[("core", "^1.0.0")]);

        let mut project = root(&[("lib", "^1.0.0")]);
        project.add_dev_dependency(Dependency::new("tester", "^1.0.0"));

        let mut registry = PackageRegistry::new();
        let resolution = Resolver::new(&downloader).resolve(&project, &mut registry);
        assert_eq!(names(&resolution), ["lib", "core", "tester"]);
        assert_eq!(resolution.dev_only(), [Dependency::new("tester", "^1.0.0")]);

        let mut registry = PackageRegistry::new();
        let resolution = Resolver::new(&downloader)
            .with_dev(false)
            .resolve(&project, &mut registry);
        assert_eq!(names(&resolution), ["lib", "core"]);
        assert!(resolution.dev_only().is_empty());
    }

    #[test]
    fn test_dev_dependency_reached_at_runtime_is_runtime() {
        let downloader = MapDownloader::default()
            .with("http", &[("stdlib", "^1.0.0")])
            .with("stdlib", &[]);
        let mut project = root(&[("http", "^2.0.0")]);
        project.add_dev_dependency(Dependency::new("stdlib", "^1.0.0"));
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader).resolve(&project, &mut registry);

        assert_eq!(names(&resolution), ["http", "stdlib"]);
        assert_eq!(resolution.runtime().len(), 2);
        assert!(resolution.dev_only().is_empty());
    }

    #[test]
    fn test_conflict_with_equal_base_keeps_existing() {
        let downloader = MapDownloader::default()
            .with("a", &[("c", "^1.0.0")])
            .with("b", &[("c", "<1.0.0")])
            .with("c", &[]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader).resolve(
            &root(&[("a", "^1.0.0"), ("b", "^1.0.0")]),
            &mut registry,
        );

        assert_eq!(resolution.selection("c"), Some("^1.0.0"));
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::Conflict {
                package: "c".into(),
                existing: "^1.0.0".into(),
                requested: "<1.0.0".into(),
                chosen: "^1.0.0".into(),
            }]
        );
    }

    #[test]
    fn test_conflict_with_unparseable_requirements_keeps_existing() {
        let downloader = MapDownloader::default()
            .with("a", &[("c", "latest")])
            .with("b", &[("c", "nightly")])
            .with("c", &[]);
        let mut registry = PackageRegistry::new();

        let resolution = Resolver::new(&downloader).resolve(
            &root(&[("a", "^1.0.0"), ("b", "^1.0.0")]),
            &mut registry,
        );

        assert_eq!(names(&resolution), ["a", "c", "b"]);
        assert_eq!(resolution.selection("c"), Some("latest"));
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::Conflict {
                package: "c".into(),
                existing: "latest".into(),
                requested: "nightly".into(),
                chosen: "latest".into(),
            }]
        );
    }

    #[test]
    fn test_registry_is_consulted_first() {
        let downloader = MapDownloader::default();
        let mut registry = PackageRegistry::new();
        let mut cached = Package::new("cached", "1.0.0");
        cached.add_dependency(Dependency::new("ghost", "*"));
        registry.register(cached);

        let resolution =
            Resolver::new(&downloader).resolve(&root(&[("cached", "^1.0.0")]), &mut registry);

        assert_eq!(names(&resolution), ["cached", "ghost"]);
    }

    #[test]
    fn test_diagnostic_display() {
        let conflict = Diagnostic::Conflict {
            package: "c".into(),
            existing: "^1.0.0".into(),
            requested: "^1.5.0".into(),
            chosen: "^1.5.0".into(),
        };
        assert_eq!(
            conflict.to_string(),
            "version conflict for 'c': '^1.0.0' vs '^1.5.0', using '^1.5.0'"
        );
        assert_eq!(conflict.package(), "c");

        let deep = Diagnostic::DepthExceeded {
            package: "p".into(),
            depth: 100,
        };
        assert!(deep.to_string().contains("excessively deep"));
    }
}
