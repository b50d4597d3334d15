//! Version requirement parsing and compatibility evaluation.
//!
//! Supported requirement forms:
//! - `*`, `x`, `X`, or an empty string: any version
//! - `^1.2.3`: caret, compatible with the leftmost non-zero component
//! - `~1.2.3`: tilde, patch-level upgrades only
//! - `>=1.0`, `>1.0`, `<=2.0`, `<2.0`: comparisons
//! - `1.0.0 - 2.0.0`: inclusive hyphen range
//! - `1.x`, `1.2.x`: wildcards
//! - `=1.2.3` or `1.2.3`: exact
//! - `^1.0.0 || ^2.0.0`: either side

use crate::version::{SemanticVersion, VersionParseError};
use std::fmt;

/// Segments that stand for "any number" inside a version.
const WILDCARD_SEGMENTS: [&str; 3] = ["x", "X", "*"];

/// Operator characters that may prefix a requirement's bound version.
const OPERATOR_CHARS: [char; 5] = ['^', '~', '>', '<', '='];

/// How many leading components a wildcard requirement pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardPrecision {
    /// Only the major component must match (`1.x`).
    Major,
    /// Major and minor must match (`1.2.x`).
    MajorMinor,
}

/// A parsed version requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Matches every version.
    Any,
    /// `=1.2.3` or `1.2.3`.
    Exact(SemanticVersion),
    /// `^1.2.3`.
    Caret(SemanticVersion),
    /// `~1.2.3`.
    Tilde(SemanticVersion),
    /// `>=1.2.3`.
    GreaterEq(SemanticVersion),
    /// `>1.2.3`.
    Greater(SemanticVersion),
    /// `<=1.2.3`.
    LessEq(SemanticVersion),
    /// `<1.2.3`.
    Less(SemanticVersion),
    /// `1.0.0 - 2.0.0`, inclusive on both ends.
    Range {
        min: SemanticVersion,
        max: SemanticVersion,
    },
    /// `1.x` or `1.2.x`, with wildcard segments read as zero in `base`.
    Wildcard {
        base: SemanticVersion,
        precision: WildcardPrecision,
    },
    /// `left || right`.
    Or(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a requirement string.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound version inside the requirement cannot be
    /// parsed.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let text = input.trim();

        if is_any(text) {
            return Ok(Self::Any);
        }

        if let Some((left, right)) = text.split_once("||") {
            return Ok(Self::Or(
                Box::new(Self::parse(left.trim())?),
                Box::new(Self::parse(right.trim())?),
            ));
        }

        if let Some((min, max)) = text.split_once(" - ") {
            return Ok(Self::Range {
                min: SemanticVersion::parse(min.trim())?,
                max: SemanticVersion::parse(max.trim())?,
            });
        }

        if let Some(rest) = text.strip_prefix('^') {
            return SemanticVersion::parse(rest).map(Self::Caret);
        }

        if let Some(rest) = text.strip_prefix('~') {
            return SemanticVersion::parse(rest).map(Self::Tilde);
        }

        // Two-character operators must be checked before their prefixes.
        if let Some(rest) = text.strip_prefix(">=") {
            return SemanticVersion::parse(rest).map(Self::GreaterEq);
        }
        if let Some(rest) = text.strip_prefix('>') {
            return SemanticVersion::parse(rest).map(Self::Greater);
        }
        if let Some(rest) = text.strip_prefix("<=") {
            return SemanticVersion::parse(rest).map(Self::LessEq);
        }
        if let Some(rest) = text.strip_prefix('<') {
            return SemanticVersion::parse(rest).map(Self::Less);
        }

        let plain = text.strip_prefix('=').map_or(text, str::trim);

        if has_wildcard(plain) {
            let base = SemanticVersion::parse(&zero_wildcards(plain))?;
            let precision = if version_core(plain).matches('.').count() >= 2 {
                WildcardPrecision::MajorMinor
            } else {
                WildcardPrecision::Major
            };
            return Ok(Self::Wildcard { base, precision });
        }

        SemanticVersion::parse(plain).map(Self::Exact)
    }

    /// Returns true if `version` satisfies this requirement.
    #[must_use]
    pub fn matches(&self, version: &SemanticVersion) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(base) => version == base,
            Self::Caret(base) => caret_matches(base, version),
            Self::Tilde(base) => {
                version >= base && version.major == base.major && version.minor == base.minor
            }
            Self::GreaterEq(base) => version >= base,
            Self::Greater(base) => version > base,
            Self::LessEq(base) => version <= base,
            Self::Less(base) => version < base,
            Self::Range { min, max } => min <= version && version <= max,
            Self::Wildcard { base, precision } => match precision {
                WildcardPrecision::Major => version.major == base.major,
                WildcardPrecision::MajorMinor => {
                    version.major == base.major && version.minor == base.minor
                }
            },
            Self::Or(left, right) => left.matches(version) || right.matches(version),
        }
    }
}

/// Caret compatibility: upgrades may not change the leftmost non-zero
/// component, and `^0.0.z` pins the exact patch.
fn caret_matches(base: &SemanticVersion, version: &SemanticVersion) -> bool {
    if version < base {
        return false;
    }
    if base.major > 0 {
        version.major == base.major
    } else if base.minor > 0 {
        version.major == base.major && version.minor == base.minor
    } else {
        version == base
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "{v}"),
            Self::Caret(v) => write!(f, "^{v}"),
            Self::Tilde(v) => write!(f, "~{v}"),
            Self::GreaterEq(v) => write!(f, ">={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::LessEq(v) => write!(f, "<={v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::Range { min, max } => write!(f, "{min} - {max}"),
            Self::Wildcard { base, precision } => match precision {
                WildcardPrecision::Major => write!(f, "{}.x", base.major),
                WildcardPrecision::MajorMinor => write!(f, "{}.{}.x", base.major, base.minor),
            },
            Self::Or(left, right) => write!(f, "{left} || {right}"),
        }
    }
}

/// Check whether an installed version string satisfies a requirement.
///
/// `installed` may itself carry an operator prefix (an already-selected
/// requirement such as `^1.0.0`); its bound version is used as the candidate.
/// This never fails: if either side cannot be parsed, the two strings are
/// compared for equality instead.
#[must_use]
pub fn is_version_compatible(required: &str, installed: &str) -> bool {
    match (VersionConstraint::parse(required), requirement_base(installed)) {
        (Ok(constraint), Ok(candidate)) => constraint.matches(&candidate),
        _ => required.trim() == installed.trim(),
    }
}

/// Extract the bound version of a requirement string.
///
/// Takes the first alternative of an `||`, the lower bound of a hyphen range,
/// strips operator prefixes and reads wildcard segments as zero. A
/// requirement that accepts anything yields `0.0.0`.
///
/// # Errors
///
/// Returns an error if what remains is not a parseable version.
pub fn requirement_base(requirement: &str) -> Result<SemanticVersion, VersionParseError> {
    let mut text = requirement.trim();
    if let Some((left, _)) = text.split_once("||") {
        text = left.trim();
    }
    if let Some((min, _)) = text.split_once(" - ") {
        text = min.trim();
    }
    let text = text.trim_start_matches(OPERATOR_CHARS).trim();

    if is_any(text) {
        return Ok(SemanticVersion::default());
    }
    SemanticVersion::parse(&zero_wildcards(text))
}

fn is_any(text: &str) -> bool {
    matches!(text, "" | "*" | "x" | "X")
}

/// The numeric part of a version, before any pre-release or build suffix.
fn version_core(text: &str) -> &str {
    text.find(['-', '+']).map_or(text, |idx| &text[..idx])
}

fn is_wildcard_segment(segment: &str) -> bool {
    WILDCARD_SEGMENTS.contains(&segment)
}

fn has_wildcard(text: &str) -> bool {
    version_core(text).split('.').any(is_wildcard_segment)
}

/// Replace every wildcard segment of the version core with `0`.
fn zero_wildcards(text: &str) -> String {
    let core = version_core(text);
    let suffix = &text[core.len()..];
    let mut zeroed = core
        .split('.')
        .map(|segment| {
            if is_wildcard_segment(segment) {
                "0"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(".");
    zeroed.push_str(suffix);
    zeroed
}
