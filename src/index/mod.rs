// src/index/mod.rs

//! Package index queries and release resolution
//!
//! This module provides:
//! - The `PackageIndex` trait answering "which releases match a specifier"
//! - `PypiIndex`, a client for the PyPI JSON API
//! - `StaticIndex`, an in-memory index for offline use and tests
//! - `resolve`, which picks the most recent matching release

use crate::error::{Error, Result};
use crate::version::{parse_version, PackageSpecifier, Version};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for index requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default package index
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

/// One distribution file uploaded for a release
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseFile {
    pub filename: String,
    #[serde(default)]
    pub upload_time_iso_8601: Option<DateTime<Utc>>,
    #[serde(default)]
    pub yanked: bool,
}

/// Metadata the index publishes for a release
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseMetadata {
    pub files: Vec<ReleaseFile>,
}

impl ReleaseMetadata {
    /// Time of the first upload for this release
    pub fn upload_time(&self) -> Option<DateTime<Utc>> {
        self.files
            .iter()
            .filter_map(|f| f.upload_time_iso_8601)
            .min()
    }

    /// A release with no files, or only yanked ones, cannot be installed
    pub fn is_installable(&self) -> bool {
        self.files.iter().any(|f| !f.yanked)
    }
}

/// A single release as listed by the index
#[derive(Debug, Clone)]
pub struct Release {
    /// Version string as published
    pub version: String,
    pub parsed: Version,
    pub metadata: ReleaseMetadata,
}

/// Releases matching a specifier, in the index's own order
#[derive(Debug, Clone)]
pub struct ReleaseSet {
    pub name: String,
    pub releases: Vec<Release>,
}

/// Source of release listings
pub trait PackageIndex {
    /// List the releases of `spec.name()` that satisfy `spec`
    ///
    /// Releases keep the order the index reports them in. Pre-releases are
    /// only listed when `include_prereleases` is set.
    fn releases(&self, spec: &PackageSpecifier, include_prereleases: bool) -> Result<ReleaseSet>;
}

/// How `resolve` decides which release is the most recent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleaseOrder {
    /// Last entry in the index's order, as reported
    #[default]
    Index,
    /// Highest version number
    Version,
    /// Latest first-upload time; releases without files sort first
    UploadTime,
}

impl FromStr for ReleaseOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "index" => Ok(ReleaseOrder::Index),
            "version" => Ok(ReleaseOrder::Version),
            "upload-time" => Ok(ReleaseOrder::UploadTime),
            other => Err(Error::ParseError(format!(
                "Unknown release order '{}' (expected index, version or upload-time)",
                other
            ))),
        }
    }
}

impl fmt::Display for ReleaseOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReleaseOrder::Index => "index",
            ReleaseOrder::Version => "version",
            ReleaseOrder::UploadTime => "upload-time",
        })
    }
}

/// The release selected by `resolve`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub name: String,
    /// Version string as published
    pub version: String,
}

/// Resolve the most recent release matching `spec`
///
/// With `ReleaseOrder::Index` the index's listing order is trusted and the
/// last entry wins; nothing is re-sorted.
pub fn resolve(
    index: &dyn PackageIndex,
    spec: &PackageSpecifier,
    include_prereleases: bool,
    order: ReleaseOrder,
) -> Result<ResolvedRelease> {
    info!("Resolving latest release for {}", spec);

    let set = index
        .releases(spec, include_prereleases)
        .map_err(|e| match e {
            Error::ResolutionError(_) => e,
            other => Error::ResolutionError(format!("Index query for {} failed: {}", spec, other)),
        })?;

    debug!("Index returned {} matching release(s)", set.releases.len());

    let latest = match order {
        ReleaseOrder::Index => set.releases.last(),
        ReleaseOrder::Version => set.releases.iter().max_by(|a, b| a.parsed.cmp(&b.parsed)),
        ReleaseOrder::UploadTime => set
            .releases
            .iter()
            .max_by_key(|r| r.metadata.upload_time()),
    }
    .ok_or_else(|| Error::ResolutionError(format!("No release found matching {}", spec)))?;

    info!("Resolved {} to {} {}", spec, set.name, latest.version);

    Ok(ResolvedRelease {
        name: set.name,
        version: latest.version.clone(),
    })
}

/// Parse and filter raw `(version, metadata)` entries against a specifier
fn matching_releases<I>(spec: &PackageSpecifier, include_prereleases: bool, entries: I) -> Vec<Release>
where
    I: IntoIterator<Item = (String, ReleaseMetadata)>,
{
    entries
        .into_iter()
        .filter_map(|(version, metadata)| match parse_version(&version) {
            Ok(parsed) => Some(Release {
                version,
                parsed,
                metadata,
            }),
            Err(e) => {
                warn!("Skipping release: {}", e);
                None
            }
        })
        .filter(|r| include_prereleases || !r.parsed.any_prerelease())
        .filter(|r| spec.matches(&r.parsed))
        .collect()
}

/// PyPI project document (`/pypi/<name>/json`)
#[derive(Debug, Deserialize)]
struct ProjectDocument {
    info: ProjectInfo,
    // Map keeps document order (serde_json `preserve_order`)
    releases: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    name: String,
}

/// Client for the PyPI JSON API
pub struct PypiIndex {
    client: Client,
    base_url: String,
}

impl PypiIndex {
    /// Create a client for the index at `base_url` (e.g. `https://pypi.org`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::ResolutionError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, name)
    }

    fn fetch_project(&self, name: &str) -> Result<ProjectDocument> {
        let url = self.project_url(name);
        info!("Querying package index: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::ResolutionError(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ResolutionError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .json()
            .map_err(|e| Error::ResolutionError(format!("Failed to parse index JSON: {}", e)))
    }
}

impl PackageIndex for PypiIndex {
    fn releases(&self, spec: &PackageSpecifier, include_prereleases: bool) -> Result<ReleaseSet> {
        let document = self.fetch_project(spec.name())?;

        let entries = document
            .releases
            .into_iter()
            .filter_map(|(version, files)| match serde_json::from_value::<Vec<ReleaseFile>>(files) {
                Ok(files) => Some((version, ReleaseMetadata { files })),
                Err(e) => {
                    warn!("Skipping release '{}' with malformed file list: {}", version, e);
                    None
                }
            })
            .filter(|(version, metadata)| {
                let installable = metadata.is_installable();
                if !installable {
                    debug!("Skipping release '{}' with no installable files", version);
                }
                installable
            });

        Ok(ReleaseSet {
            name: document.info.name,
            releases: matching_releases(spec, include_prereleases, entries),
        })
    }
}

/// In-memory index with a fixed release listing per package
#[derive(Debug, Clone, Default)]
pub struct StaticIndex {
    packages: Vec<(String, Vec<(String, ReleaseMetadata)>)>,
}

impl StaticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package with releases listed in index order
    pub fn with_package<S: Into<String>>(mut self, name: &str, versions: impl IntoIterator<Item = S>) -> Self {
        let releases = versions
            .into_iter()
            .map(|v| (v.into(), ReleaseMetadata::default()))
            .collect();
        self.packages.push((name.to_string(), releases));
        self
    }

    /// Register a package with explicit release metadata
    pub fn with_releases(mut self, name: &str, releases: Vec<(String, ReleaseMetadata)>) -> Self {
        self.packages.push((name.to_string(), releases));
        self
    }
}

impl PackageIndex for StaticIndex {
    fn releases(&self, spec: &PackageSpecifier, include_prereleases: bool) -> Result<ReleaseSet> {
        let (name, releases) = self
            .packages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(spec.name()))
            .ok_or_else(|| {
                Error::ResolutionError(format!("Package '{}' not found on index", spec.name()))
            })?;

        Ok(ReleaseSet {
            name: name.clone(),
            releases: matching_releases(spec, include_prereleases, releases.iter().cloned()),
        })
    }
}
