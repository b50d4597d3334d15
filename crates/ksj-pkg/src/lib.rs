//! Package management for the KingSejong programming language.
//!
//! This crate provides:
//! - Semantic version parsing and npm-style requirement matching
//! - Parsing and writing of `package.ksj` manifests
//! - Depth-first dependency resolution with conflict diagnostics
//! - A local package source and an installed package index
//! - Project-level install, add, remove and info operations

mod config;
mod constraint;
mod fetch;
mod index;
mod layout;
mod manager;
mod manifest;
mod registry;
mod resolve;
mod version;

pub use config::{ManagerConfig, MAX_DEPTH_ENV, MODULES_DIR_ENV};
pub use constraint::{
    is_version_compatible, requirement_base, VersionConstraint, WildcardPrecision,
};
pub use fetch::{Downloader, FetchError, LocalDownloader, STDLIB_PACKAGE};
pub use index::{manifest_checksum, IndexEntry, IndexError, PackageIndex};
pub use layout::{
    module_manifest_path, LayoutError, ProjectLayout, DEFAULT_MAIN, INDEX_FILE, MANIFEST_FILE,
    MODULES_DIR,
};
pub use manager::{InstallReport, ManagerError, PackageManager, DEFAULT_REQUIREMENT};
pub use manifest::{Author, Dependency, ManifestError, Package};
pub use registry::PackageRegistry;
pub use resolve::{Diagnostic, Resolution, Resolver, MAX_DEPTH};
pub use version::{SemanticVersion, VersionParseError};
