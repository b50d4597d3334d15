//! Package manifest (`package.ksj`) parsing and serialization.
//!
//! ```json
//! {
//!   "name": "my-package",
//!   "version": "1.0.0",
//!   "description": "My awesome package",
//!   "author": "Hong Gildong",
//!   "license": "MIT",
//!   "main": "src/index.ksj",
//!   "dependencies": {
//!     "stdlib": "^1.0.0",
//!     "http-client": "~2.1.0"
//!   },
//!   "dev_dependencies": {
//!     "test-framework": "^1.0.0"
//!   }
//! }
//! ```

use crate::layout::DEFAULT_MAIN;
use crate::version::SemanticVersion;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when working with manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid package name '{0}': {1}")]
    InvalidName(String, &'static str),

    #[error("invalid version '{0}': {1}")]
    InvalidVersion(String, String),
}

/// A dependency as written in a manifest: a package name and its raw
/// requirement string. The requirement is parsed at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    /// Package name.
    pub name: String,
    /// Requirement text, e.g. `^1.2.0` or `1.0.0 - 2.0.0`.
    pub constraint: String,
}

impl Dependency {
    /// Create a dependency from a name and requirement string.
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }

    /// The `name@constraint` key identifying this exact requirement.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.constraint)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.constraint)
    }
}

/// A package author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Author name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
}

impl Author {
    /// Create an author without an email address.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
        }
    }

    /// Create an author with an email address.
    pub fn with_email(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Some(email.into()),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{email}>", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Package metadata loaded from `package.ksj`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Package name (required).
    pub name: String,

    /// Package version (required).
    pub version: String,

    /// Short description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// License identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Entry point file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Package authors.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_authors"
    )]
    pub authors: Vec<Author>,

    /// Runtime dependencies, in manifest order.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_dependencies"
    )]
    pub dependencies: Vec<Dependency>,

    /// Development-only dependencies, in manifest order.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_dependencies"
    )]
    pub dev_dependencies: Vec<Dependency>,

    /// Named script commands.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
}

/// On-disk shape of a manifest before validation.
#[derive(Deserialize)]
struct RawPackage {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    authors: Option<Vec<RawAuthor>>,
    /// Legacy single-author field.
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    dependencies: OrderedDependencies,
    #[serde(default)]
    dev_dependencies: OrderedDependencies,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

/// An author entry: either a plain name or a `{name, email}` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAuthor {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        email: Option<String>,
    },
}

impl From<RawAuthor> for Author {
    fn from(raw: RawAuthor) -> Self {
        match raw {
            RawAuthor::Name(name) => Self::new(name),
            RawAuthor::Detailed { name, email } => Self {
                name,
                email: email.filter(|e| !e.is_empty()),
            },
        }
    }
}

/// A JSON object of `name -> requirement` read in document order.
#[derive(Default)]
struct OrderedDependencies(Vec<Dependency>);

impl<'de> Deserialize<'de> for OrderedDependencies {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DepsVisitor;

        impl<'de> serde::de::Visitor<'de> for DepsVisitor {
            type Value = OrderedDependencies;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping package names to version requirements")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut deps: Vec<Dependency> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, constraint)) = map.next_entry::<String, String>()? {
                    // A repeated key replaces the earlier entry in place.
                    upsert(&mut deps, Dependency::new(name, constraint));
                }
                Ok(OrderedDependencies(deps))
            }
        }

        deserializer.deserialize_map(DepsVisitor)
    }
}

fn serialize_dependencies<S>(deps: &[Dependency], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(deps.len()))?;
    for dep in deps {
        map.serialize_entry(&dep.name, &dep.constraint)?;
    }
    map.end()
}

fn serialize_authors<S>(authors: &[Author], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    #[derive(Serialize)]
    struct Detailed<'a> {
        name: &'a str,
        email: &'a str,
    }

    let mut seq = serializer.serialize_seq(Some(authors.len()))?;
    for author in authors {
        match &author.email {
            Some(email) => seq.serialize_element(&Detailed {
                name: &author.name,
                email,
            })?,
            None => seq.serialize_element(&author.name)?,
        }
    }
    seq.end()
}

impl Package {
    /// Create a new package with the default license and entry point.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            license: Some(String::from("MIT")),
            main: Some(String::from(DEFAULT_MAIN)),
            authors: Vec::new(),
            dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
            scripts: BTreeMap::new(),
        }
    }

    /// Load a manifest from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read, or is not
    /// a valid manifest.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a manifest from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or missing required fields.
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let raw: RawPackage = serde_json::from_str(content)?;

        let authors = match (raw.authors, raw.author) {
            (Some(list), _) => list.into_iter().map(Author::from).collect(),
            (None, Some(single)) => vec![Author::new(single)],
            (None, None) => Vec::new(),
        };

        let package = Self {
            name: raw.name.ok_or(ManifestError::MissingField("name"))?,
            version: raw.version.ok_or(ManifestError::MissingField("version"))?,
            description: raw.description,
            license: raw.license,
            main: raw.main,
            authors,
            dependencies: raw.dependencies.0,
            dev_dependencies: raw.dev_dependencies.0,
            scripts: raw.scripts,
        };
        package.validate()?;
        Ok(package)
    }

    /// Serialize the manifest to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the manifest to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let mut content = self.to_json()?;
        content.push('\n');
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the manifest.
    fn validate(&self) -> Result<(), ManifestError> {
        validate_name(&self.name)?;
        SemanticVersion::parse(&self.version)
            .map_err(|e| ManifestError::InvalidVersion(self.version.clone(), e.to_string()))?;
        Ok(())
    }

    /// Add a runtime dependency, replacing any existing entry of that name.
    pub fn add_dependency(&mut self, dep: Dependency) {
        upsert(&mut self.dependencies, dep);
    }

    /// Add a development dependency, replacing any existing entry of that name.
    pub fn add_dev_dependency(&mut self, dep: Dependency) {
        upsert(&mut self.dev_dependencies, dep);
    }

    /// Remove a dependency from both sections.
    ///
    /// Returns true if anything was removed.
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        let before = self.dependencies.len() + self.dev_dependencies.len();
        self.dependencies.retain(|d| d.name != name);
        self.dev_dependencies.retain(|d| d.name != name);
        before != self.dependencies.len() + self.dev_dependencies.len()
    }

    /// Look up a runtime or development dependency by name.
    #[must_use]
    pub fn find_dependency(&self, name: &str) -> Option<&Dependency> {
        self.all_dependencies().find(|d| d.name == name)
    }

    /// All dependencies, runtime first.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().chain(self.dev_dependencies.iter())
    }
}

fn upsert(deps: &mut Vec<Dependency>, dep: Dependency) {
    match deps.iter_mut().find(|d| d.name == dep.name) {
        Some(existing) => existing.constraint = dep.constraint,
        None => deps.push(dep),
    }
}

/// Validate a package name.
pub(crate) fn validate_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty() {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name cannot be empty",
        ));
    }

    if name.len() > 214 {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name cannot exceed 214 characters",
        ));
    }

    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name cannot be a path",
        ));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(ManifestError::InvalidName(
            name.to_string(),
            "name cannot contain whitespace",
        ));
    }

    Ok(())
}
