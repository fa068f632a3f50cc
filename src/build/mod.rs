// src/build/mod.rs

//! Build driver
//!
//! Ties the pipeline together for one Microdrop major version:
//! - Resolve the latest release of `microdrop>=N.0,<N+1.0`
//! - Render the recipe into a scratch workspace
//! - Run a [`BuildCommand`] over the recipe
//! - Copy the artifact to the requested file or directory
//!
//! The scratch workspace is removed on every exit path.

pub mod tools;

use crate::error::{Error, Result};
use crate::index::{self, PackageIndex, ReleaseOrder};
use crate::recipe;
use crate::version::PackageSpecifier;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

pub use tools::{CondaBuild, ConstructorBuild, Tool};

/// Package whose releases are packaged
pub const DEFAULT_PACKAGE_NAME: &str = "microdrop";

/// Turns a recipe directory into a built artifact
pub trait BuildCommand {
    /// Build `recipe_dir` and return the path of the produced file
    fn build(&self, recipe_dir: &Path) -> Result<PathBuf>;
}

impl<F> BuildCommand for F
where
    F: Fn(&Path) -> Result<PathBuf>,
{
    fn build(&self, recipe_dir: &Path) -> Result<PathBuf> {
        self(recipe_dir)
    }
}

/// Settings shared by every build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Package resolved on the index
    pub package_name: String,
    /// Directory holding the recipe templates
    pub template_root: PathBuf,
    pub include_prereleases: bool,
    pub release_order: ReleaseOrder,
    /// Parent for scratch workspaces (system temp dir when `None`)
    pub scratch_parent: Option<PathBuf>,
}

impl BuildConfig {
    pub fn new(template_root: impl Into<PathBuf>) -> Self {
        Self {
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            template_root: template_root.into(),
            include_prereleases: true,
            release_order: ReleaseOrder::Index,
            scratch_parent: None,
        }
    }

    /// Specifier covering every release of `major`
    ///
    /// Fails with `ParseError` when `major` has no successor.
    pub fn specifier(&self, major: u64) -> Result<PackageSpecifier> {
        PackageSpecifier::for_major(&self.package_name, major)
    }

    /// Conda package name for `major`, e.g. `microdrop-2.0`
    pub fn conda_package_name(&self, major: u64) -> String {
        format!("{}-{}.0", self.package_name, major)
    }

    fn scratch_prefix(&self) -> String {
        let base = self
            .template_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recipe".to_string());
        format!("{}-", base)
    }
}

/// Temporary directory owned by a single build
///
/// Dropping the workspace removes it with all contents. `close` does the
/// same but reports removal failures.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a uniquely named workspace, `<prefix>XXXXXX`
    pub fn create(prefix: &str, parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::IoError(format!("Failed to create scratch workspace: {}", e)))?;

        debug!("Created scratch workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the workspace now
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            Error::IoError(format!(
                "Failed to remove scratch workspace {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Removed scratch workspace {}", path.display());
        Ok(())
    }
}

/// Final location of `artifact` for the requested `output_path`
///
/// An existing directory receives the artifact under its own file name;
/// anything else is taken as the exact destination file.
pub fn destination_for(artifact: &Path, output_path: &Path) -> Result<PathBuf> {
    if output_path.is_dir() {
        let file_name = artifact.file_name().ok_or_else(|| {
            Error::ArtifactNotFound(format!("Artifact path {} has no file name", artifact.display()))
        })?;
        Ok(output_path.join(file_name))
    } else {
        Ok(output_path.to_path_buf())
    }
}

/// SHA-256 of a file as lowercase hex
fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {} for checksum: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::IoError(format!("Failed to read {} for checksum: {}", path.display(), e)))?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy the artifact to `destination` and verify the copy
pub fn copy_artifact(artifact: &Path, destination: &Path) -> Result<()> {
    info!("Copying {} to {}", artifact.display(), destination.display());

    fs::copy(artifact, destination).map_err(|source| Error::CopyError {
        from: artifact.to_path_buf(),
        to: destination.to_path_buf(),
        source,
    })?;

    let expected = sha256_file(artifact)?;
    let actual = sha256_file(destination)?;
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    debug!("Artifact checksum verified: {}", expected);
    Ok(())
}

/// Resolve, render, build and copy for one major version
///
/// Returns the path of the copied artifact. Resolution happens before the
/// scratch workspace exists; every later failure removes the workspace
/// before the error is returned.
pub fn build_template(
    config: &BuildConfig,
    index: &dyn PackageIndex,
    major: u64,
    output_path: &Path,
    command: &dyn BuildCommand,
) -> Result<PathBuf> {
    let specifier = config.specifier(major)?;
    let conda_package_name = config.conda_package_name(major);

    let release = index::resolve(
        index,
        &specifier,
        config.include_prereleases,
        config.release_order,
    )?;

    let workspace = ScratchWorkspace::create(&config.scratch_prefix(), config.scratch_parent.as_deref())?;

    // Errors drop `workspace`, which removes it
    let generated = recipe::render_recipe(
        &release,
        &conda_package_name,
        &config.template_root,
        workspace.path(),
        false,
    )?;

    let artifact = command.build(&generated.dir)?;
    let destination = destination_for(&artifact, output_path)?;
    copy_artifact(&artifact, &destination)?;

    workspace.close()?;

    info!("Built {}", destination.display());
    Ok(destination)
}

/// Build the Conda package for the latest release of `major`
pub fn build_conda_package(
    config: &BuildConfig,
    index: &dyn PackageIndex,
    major: u64,
    output_path: &Path,
    conda: &CondaBuild,
) -> Result<PathBuf> {
    build_template(config, index, major, output_path, conda)
}

/// Build the Miniconda installer for the latest release of `major`
pub fn build_miniconda_installer(
    config: &BuildConfig,
    index: &dyn PackageIndex,
    major: u64,
    output_path: &Path,
    constructor: &ConstructorBuild,
) -> Result<PathBuf> {
    build_template(config, index, major, output_path, constructor)
}
