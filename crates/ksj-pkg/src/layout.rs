//! Project directory layout.
//!
//! ```text
//! my-project/
//! ├── package.ksj               # Package manifest
//! ├── index.ksj                 # Default entry point
//! └── node_modules/             # Installed packages
//!     ├── .ksjpm-index.toml     # Installed package index
//!     └── http-client/
//!         └── package.ksj
//! ```

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The manifest filename.
pub const MANIFEST_FILE: &str = "package.ksj";

/// The directory installed packages live in.
pub const MODULES_DIR: &str = "node_modules";

/// The installed package index, kept inside the modules directory.
pub const INDEX_FILE: &str = ".ksjpm-index.toml";

/// Default entry point for new packages.
pub const DEFAULT_MAIN: &str = "index.ksj";

/// Manifest path of a package installed under `modules_dir`.
#[must_use]
pub fn module_manifest_path(modules_dir: &Path, name: &str) -> PathBuf {
    modules_dir.join(name).join(MANIFEST_FILE)
}

/// Errors that can occur when locating a project.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("project directory not found: {0}")]
    NotFound(PathBuf),

    #[error("no package.ksj found in {0} or any parent directory")]
    ManifestNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Paths that make up a project.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Root directory of the project.
    pub root: PathBuf,

    /// Path to the manifest file.
    pub manifest_path: PathBuf,

    /// Directory installed packages are placed in.
    pub modules_dir: PathBuf,
}

impl ProjectLayout {
    /// Layout for a project rooted at `root` using the default modules
    /// directory. Nothing is required to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join(MANIFEST_FILE),
            modules_dir: root.join(MODULES_DIR),
            root,
        }
    }

    /// Use a different modules directory, relative to the root unless
    /// absolute.
    #[must_use]
    pub fn with_modules_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.modules_dir = self.root.join(dir);
        self
    }

    /// Find a project by searching upward from `start` for a manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if `start` does not exist or no manifest is found in
    /// the directory tree.
    pub fn find_root(start: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let start = start.as_ref();
        if !start.exists() {
            return Err(LayoutError::NotFound(start.to_path_buf()));
        }

        let mut current = start.to_path_buf();
        loop {
            if current.join(MANIFEST_FILE).exists() {
                return Ok(Self::new(current));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(LayoutError::ManifestNotFound(start.to_path_buf())),
            }
        }
    }

    /// Returns true if the project manifest exists.
    #[must_use]
    pub fn has_manifest(&self) -> bool {
        self.manifest_path.exists()
    }

    /// Create the modules directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_modules_dir(&self) -> Result<(), LayoutError> {
        if !self.modules_dir.exists() {
            std::fs::create_dir_all(&self.modules_dir)?;
        }
        Ok(())
    }

    /// Directory a package is installed into.
    #[must_use]
    pub fn module_dir(&self, name: &str) -> PathBuf {
        self.modules_dir.join(name)
    }

    /// Path of the installed package index.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.modules_dir.join(INDEX_FILE)
    }
}
