//! Semantic version parsing and ordering.
//!
//! A version is a `MAJOR.MINOR.PATCH` triple. Minor and patch are optional
//! when parsing and default to zero. Pre-release (`-beta`) and build
//! (`+build123`) suffixes are accepted but discarded, so they take no part in
//! ordering or equality.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing a version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("empty version string")]
    Empty,

    #[error("invalid {segment} segment '{value}' in version '{version}'")]
    InvalidSegment {
        version: String,
        segment: &'static str,
        value: String,
    },
}

/// A parsed `(major, minor, patch)` version.
///
/// Field order matters: the derived `Ord` compares major, then minor, then
/// patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    /// Create a version from its three components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string such as `1.2.3`, `v2.0`, or `1.0.0-beta+exp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty or a present numeric segment
    /// is not a non-negative integer.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let text = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if text.is_empty() {
            return Err(VersionParseError::Empty);
        }

        // Anything past the third segment belongs to a pre-release tag
        // (e.g. `1.2.3-beta.1`) and is ignored.
        let mut segments = text.split('.');

        let major = segments
            .next()
            .map(|s| parse_segment(input, "major", s))
            .transpose()?
            .unwrap_or_default();
        let minor = segments
            .next()
            .map(|s| parse_segment(input, "minor", s))
            .transpose()?
            .unwrap_or_default();
        let patch = segments
            .next()
            .map(|s| parse_segment(input, "patch", strip_suffix(s)))
            .transpose()?
            .unwrap_or_default();

        Ok(Self::new(major, minor, patch))
    }
}

/// Truncate a patch segment at the first pre-release or build marker.
fn strip_suffix(segment: &str) -> &str {
    segment
        .find(['-', '+'])
        .map_or(segment, |idx| &segment[..idx])
}

fn parse_segment(
    version: &str,
    segment: &'static str,
    value: &str,
) -> Result<u64, VersionParseError> {
    // `u64::from_str` accepts a leading '+', which is not a version digit.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionParseError::InvalidSegment {
            version: version.to_string(),
            segment,
            value: value.to_string(),
        });
    }
    value
        .parse::<u64>()
        .map_err(|_| VersionParseError::InvalidSegment {
            version: version.to_string(),
            segment,
            value: value.to_string(),
        })
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
