//! Record of installed packages.
//!
//! The index lives at `node_modules/.ksjpm-index.toml` and tracks which
//! requirement each package was installed for, when, and a checksum of the
//! manifest that was recorded.

use crate::manifest::{ManifestError, Package};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when reading or writing the index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse package index: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize package index: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A single installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Package name.
    pub name: String,
    /// Version of the installed manifest.
    pub version: String,
    /// Requirement the package was installed for.
    pub requirement: String,
    /// SHA256 checksum of the installed manifest.
    pub checksum: String,
    /// Installation timestamp (RFC 3339).
    pub installed_at: String,
    /// Installed as a development dependency.
    #[serde(default)]
    pub dev: bool,
}

impl IndexEntry {
    /// Build an entry for `package`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized for hashing.
    pub fn for_package(
        package: &Package,
        requirement: impl Into<String>,
        dev: bool,
    ) -> Result<Self, ManifestError> {
        Ok(Self {
            name: package.name.clone(),
            version: package.version.clone(),
            requirement: requirement.into(),
            checksum: manifest_checksum(package)?,
            installed_at: chrono::Utc::now().to_rfc3339(),
            dev,
        })
    }
}

/// SHA256 of a package's canonical JSON form, hex encoded.
///
/// # Errors
///
/// Returns an error if the manifest cannot be serialized.
pub fn manifest_checksum(package: &Package) -> Result<String, ManifestError> {
    use sha2::{Digest, Sha256};
    let json = package.to_json()?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// The index file tracking all installed packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageIndex {
    /// Version of the index format.
    pub version: u32,
    /// Map of package name to entry.
    #[serde(default)]
    pub packages: BTreeMap<String, IndexEntry>,
}

impl PackageIndex {
    /// Current index format version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            packages: BTreeMap::new(),
        }
    }

    /// Load the index from a file. A missing file is an empty index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save the index to a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Get a package entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.packages.get(name)
    }

    /// Add or update a package entry.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.packages.insert(entry.name.clone(), entry);
    }

    /// Remove a package entry.
    pub fn remove(&mut self, name: &str) -> Option<IndexEntry> {
        self.packages.remove(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.packages.values()
    }

    /// Number of installed packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
