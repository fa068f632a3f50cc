// src/version/mod.rs

//! Package version-range specifiers
//!
//! Package indexes publish PEP 440 version strings such as `2.0`, `2.1rc1`
//! or `2.0.post3`. Parsing, ordering and range matching come from
//! `pep440_rs`; this module pairs a package name with its version range.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

pub use pep440_rs::{Operator, Version, VersionSpecifier, VersionSpecifiers};

/// Parse a published version string
pub fn parse_version(version: &str) -> Result<Version> {
    Version::from_str(version)
        .map_err(|e| Error::ParseError(format!("Invalid version '{}': {}", version, e)))
}

/// Package name plus the version range of eligible releases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpecifier {
    name: String,
    specifiers: VersionSpecifiers,
}

impl PackageSpecifier {
    /// Specifier admitting every release of one major version
    ///
    /// `for_major("microdrop", 3)` yields `microdrop>=3.0,<4.0`.
    pub fn for_major(name: &str, major: u64) -> Result<Self> {
        let upper = major.checked_add(1).ok_or_else(|| {
            Error::ParseError(format!("Major version {} has no successor", major))
        })?;

        format!("{}>={}.0,<{}.0", name, major, upper).parse()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specifiers(&self) -> &VersionSpecifiers {
        &self.specifiers
    }

    /// True if the version satisfies every clause
    ///
    /// Exclusive bounds follow PEP 440: `<4.0` rejects `4.0rc1`.
    pub fn matches(&self, version: &Version) -> bool {
        self.specifiers.contains(version)
    }
}

impl FromStr for PackageSpecifier {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        let name_end = input
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(input.len());
        let (name, clauses) = input.split_at(name_end);

        if name.is_empty() {
            return Err(Error::ParseError(format!(
                "Missing package name in specifier '{}'",
                input
            )));
        }

        let specifiers = if clauses.trim().is_empty() {
            std::iter::empty::<VersionSpecifier>().collect()
        } else {
            clauses.trim().parse::<VersionSpecifiers>().map_err(|e| {
                Error::ParseError(format!("Invalid specifier '{}': {}", input, e))
            })?
        };

        Ok(Self {
            name: name.to_string(),
            specifiers,
        })
    }
}

impl fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, specifier) in self.specifiers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", specifier)?;
        }
        Ok(())
    }
}
