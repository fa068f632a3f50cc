// src/recipe/mod.rs

//! Recipe generation from a template directory
//!
//! Every file directly inside the template directory is either rendered
//! as a Jinja template (when it parses as one) or copied byte for byte
//! (when it does not). Undefined variables render as empty text, the way
//! conda-build's own Jinja rendering treats them. Rendered recipes land in
//! `<output_root>/<name>-<version>`.

use crate::error::{Error, Result};
use crate::index::{self, PackageIndex, ReleaseOrder, ResolvedRelease};
use crate::version::PackageSpecifier;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Variables available to every recipe template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateContext {
    /// Name of the Conda package being built, e.g. `microdrop-2.0`
    pub conda_package_name: String,
    /// Resolved release version
    pub version: String,
}

/// Options shared by recipe generation entry points
#[derive(Debug, Clone, Copy)]
pub struct RecipeOptions {
    /// Replace existing output files instead of failing
    pub overwrite: bool,
    /// Consider pre-releases when resolving the version
    pub include_prereleases: bool,
    pub release_order: ReleaseOrder,
}

impl Default for RecipeOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            include_prereleases: true,
            release_order: ReleaseOrder::Index,
        }
    }
}

/// A recipe directory written for one release
#[derive(Debug, Clone)]
pub struct GeneratedRecipe {
    pub release: ResolvedRelease,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Environment with lenient undefined handling and no autoescaping
fn template_environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env
}

/// Try to parse `content` as a template named `name`
///
/// Returns `None` for content that is not UTF-8 or not valid template
/// syntax; such files are copied verbatim.
fn parse_template<'source>(name: &'source str, content: &'source [u8]) -> Option<Environment<'source>> {
    let text = std::str::from_utf8(content).ok()?;

    let mut env = template_environment();
    match env.add_template(name, text) {
        Ok(()) => Some(env),
        Err(e) => {
            debug!("{} is not a template ({}), copying as-is", name, e);
            None
        }
    }
}

/// Flatten a template error and its causes into one line
fn describe_template_error(error: &minijinja::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// List regular files directly inside `dir`, sorted by name
fn template_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::IoError(format!("Failed to read template directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Render every file of `template_dir` into `output_dir`
///
/// Fails with `OutputExistsError` on the first destination that already
/// exists unless `overwrite` is set. Files written before the failure stay
/// on disk. Subdirectories of `template_dir` are ignored.
pub fn render_templates(
    template_dir: &Path,
    output_dir: &Path,
    context: &TemplateContext,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).map_err(|e| {
        Error::IoError(format!("Failed to create directory {}: {}", output_dir.display(), e))
    })?;

    let mut written = Vec::new();

    for template_path in template_files(template_dir)? {
        let Some(file_name) = template_path.file_name() else {
            continue;
        };
        let output_path = output_dir.join(file_name);

        if output_path.exists() && !overwrite {
            return Err(Error::OutputExistsError(output_path));
        }

        let content = fs::read(&template_path)?;
        let name = file_name.to_string_lossy();

        match parse_template(&name, &content) {
            Some(env) => {
                let rendered = env
                    .get_template(&name)
                    .and_then(|template| template.render(context))
                    .map_err(|e| Error::TemplateError {
                        path: template_path.clone(),
                        message: describe_template_error(&e),
                    })?;
                fs::write(&output_path, rendered)?;
                debug!("Rendered {}", output_path.display());
            }
            None => {
                fs::write(&output_path, &content)?;
                debug!("Copied {}", output_path.display());
            }
        }

        written.push(output_path);
    }

    Ok(written)
}

/// Render the recipe for an already resolved release
///
/// Output goes to `<output_root>/<name>-<version>`.
pub fn render_recipe(
    release: &ResolvedRelease,
    conda_package_name: &str,
    template_root: &Path,
    output_root: &Path,
    overwrite: bool,
) -> Result<GeneratedRecipe> {
    let dir = output_root.join(format!("{}-{}", release.name, release.version));
    let context = TemplateContext {
        conda_package_name: conda_package_name.to_string(),
        version: release.version.to_string(),
    };

    info!(
        "Generating recipe for {} {} in {}",
        conda_package_name,
        release.version,
        dir.display()
    );

    let files = render_templates(template_root, &dir, &context, overwrite)?;

    Ok(GeneratedRecipe {
        release: release.clone(),
        dir,
        files,
    })
}

/// Resolve the latest release matching `specifier` and render its recipe
pub fn generate_recipe(
    index: &dyn PackageIndex,
    specifier: &PackageSpecifier,
    conda_package_name: &str,
    template_root: &Path,
    output_root: &Path,
    options: &RecipeOptions,
) -> Result<GeneratedRecipe> {
    let release = index::resolve(
        index,
        specifier,
        options.include_prereleases,
        options.release_order,
    )?;

    render_recipe(
        &release,
        conda_package_name,
        template_root,
        output_root,
        options.overwrite,
    )
}
