//! In-memory registry of known packages.
//!
//! The registry is the resolver's cache of package manifests. It keeps the
//! most recently registered [`Package`] for each name and nothing else.

use crate::manifest::Package;
use std::collections::BTreeMap;

/// A mapping from package name to the last registered manifest.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: BTreeMap<String, Package>,
}

impl PackageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a package by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Register a package, replacing any earlier entry with the same name.
    pub fn register(&mut self, package: Package) {
        self.packages.insert(package.name.clone(), package);
    }

    /// Returns true if a package with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Remove a package, returning it if it was registered.
    pub fn remove(&mut self, name: &str) -> Option<Package> {
        self.packages.remove(name)
    }

    /// Number of registered packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate over registered packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }
}
