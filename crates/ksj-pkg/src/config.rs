//! Package manager configuration.

use crate::layout::{ProjectLayout, MODULES_DIR};
use crate::resolve::MAX_DEPTH;
use std::path::PathBuf;
use tracing::warn;

/// Environment variable overriding the modules directory.
pub const MODULES_DIR_ENV: &str = "KSJPM_MODULES_DIR";

/// Environment variable overriding the resolver depth bound.
pub const MAX_DEPTH_ENV: &str = "KSJPM_MAX_DEPTH";

/// Settings for a [`PackageManager`](crate::PackageManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Root directory of the project.
    pub project_root: PathBuf,
    /// Modules directory, relative to the root unless absolute.
    pub modules_dir: PathBuf,
    /// Resolver depth bound.
    pub max_depth: usize,
    /// Whether the root package's dev-dependencies are resolved.
    pub include_dev: bool,
}

impl ManagerConfig {
    /// Default configuration for a project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            modules_dir: PathBuf::from(MODULES_DIR),
            max_depth: MAX_DEPTH,
            include_dev: true,
        }
    }

    /// Configuration for `root` with overrides from the process environment.
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        Self::from_lookup(root, |key| std::env::var(key).ok())
    }

    /// Configuration for `root` with overrides from `lookup`.
    pub fn from_lookup(
        root: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::new(root);

        if let Some(dir) = lookup(MODULES_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.modules_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup(MAX_DEPTH_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(depth) => config.max_depth = depth,
                Err(_) => warn!(value = %raw, "ignoring invalid {}", MAX_DEPTH_ENV),
            }
        }

        config
    }

    /// Resolve the root package's dev-dependencies or not.
    #[must_use]
    pub fn with_dev(mut self, include: bool) -> Self {
        self.include_dev = include;
        self
    }

    /// The project layout these settings describe.
    #[must_use]
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.project_root).with_modules_dir(&self.modules_dir)
    }
}
