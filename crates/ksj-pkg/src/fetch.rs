//! Obtaining package manifests that are not yet in the registry.
//!
//! The [`Downloader`] trait is the resolver's only way to reach outside the
//! registry. [`LocalDownloader`] serves the built-in `stdlib` package and
//! packages already present in the project's modules directory; there is no
//! remote source.

use crate::constraint::requirement_base;
use crate::layout::module_manifest_path;
use crate::manifest::{ManifestError, Package};
use std::path::PathBuf;
use thiserror::Error;

/// Name of the package that ships with the language.
pub const STDLIB_PACKAGE: &str = "stdlib";

/// Errors that can occur while obtaining a package manifest.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No source can supply the package.
    #[error("package '{name}' not found")]
    NotFound { name: String },

    /// The package exists but its manifest is unusable.
    #[error("invalid manifest for package '{name}': {source}")]
    Manifest {
        name: String,
        #[source]
        source: ManifestError,
    },

    /// IO error while reading the package.
    #[error("IO error fetching '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Returns true if the package simply does not exist anywhere.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A source of package manifests.
pub trait Downloader {
    /// Obtain the manifest of `name` for the given requirement.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when no source can supply the
    /// package, or another variant when the package is present but unusable.
    fn fetch(&self, name: &str, constraint: &str) -> Result<Package, FetchError>;
}

/// Serves `stdlib` and packages from a local modules directory.
#[derive(Debug, Clone)]
pub struct LocalDownloader {
    modules_dir: PathBuf,
}

impl LocalDownloader {
    /// Create a downloader reading from `modules_dir`.
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    /// The synthetic manifest of the built-in standard library.
    fn stdlib(constraint: &str) -> Package {
        let version = requirement_base(constraint)
            .ok()
            .filter(|v| *v != crate::SemanticVersion::default())
            .map_or_else(|| String::from("1.0.0"), |v| v.to_string());
        let mut package = Package::new(STDLIB_PACKAGE, version);
        package.description = Some(String::from("KingSejong standard library"));
        package
    }
}

impl Downloader for LocalDownloader {
    fn fetch(&self, name: &str, constraint: &str) -> Result<Package, FetchError> {
        if name == STDLIB_PACKAGE {
            return Ok(Self::stdlib(constraint));
        }

        let manifest_path = module_manifest_path(&self.modules_dir, name);
        match Package::from_path(&manifest_path) {
            Ok(package) => Ok(package),
            Err(ManifestError::NotFound(_)) => Err(FetchError::NotFound {
                name: name.to_string(),
            }),
            Err(ManifestError::Io(source)) => Err(FetchError::Io {
                name: name.to_string(),
                source,
            }),
            Err(source) => Err(FetchError::Manifest {
                name: name.to_string(),
                source,
            }),
        }
    }
}
