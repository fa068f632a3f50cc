// src/build/tools.rs

//! Adapters for the external packaging tools
//!
//! `CondaBuild` drives `conda build`, `ConstructorBuild` drives
//! `constructor`. Both implement [`BuildCommand`] and fail with
//! `BuildCommandError` when the tool exits non-zero.

use super::BuildCommand;
use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

/// Installer file pattern produced by `constructor` on Windows targets
const INSTALLER_PATTERN: &str = "*.exe";

/// An external program plus any arguments that precede each invocation
///
/// `Tool::new("conda")` runs `conda ...`; `Tool::new("python").arg("-m").arg("conda")`
/// runs `python -m conda ...`.
#[derive(Debug, Clone)]
pub struct Tool {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl Tool {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            leading_args: Vec::new(),
        }
    }

    /// Append an argument passed before the adapter's own arguments
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.leading_args.push(arg.as_ref().to_os_string());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args);
        command
    }
}

/// Render a command line for logs and error messages
fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command to completion, capturing its output
///
/// Blocks until the process exits; there is no timeout.
fn run_checked(command: &mut Command) -> Result<Output> {
    let description = describe(command);
    info!("Running {}", description);

    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| Error::ToolLaunchError {
            command: description.clone(),
            source,
        })?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!("{}", line);
    }

    if !output.status.success() {
        return Err(Error::BuildCommandError {
            command: description,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Builds a Conda package archive with `conda build`
#[derive(Debug, Clone)]
pub struct CondaBuild {
    tool: Tool,
}

impl CondaBuild {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }
}

impl Default for CondaBuild {
    fn default() -> Self {
        Self::new(Tool::new("conda"))
    }
}

impl BuildCommand for CondaBuild {
    fn build(&self, recipe_dir: &Path) -> Result<PathBuf> {
        run_checked(self.tool.command().arg("build").arg(recipe_dir))?;

        let output = run_checked(
            self.tool
                .command()
                .arg("build")
                .arg("--output")
                .arg(recipe_dir),
        )?;

        // conda may print warnings ahead of the path
        let stdout = String::from_utf8_lossy(&output.stdout);
        let artifact = stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| {
                Error::ArtifactNotFound(format!(
                    "`conda build --output` printed no path for {}",
                    recipe_dir.display()
                ))
            })?;

        info!("conda build produced {}", artifact);
        Ok(PathBuf::from(artifact))
    }
}

/// Builds a Miniconda installer with `constructor`
#[derive(Debug, Clone)]
pub struct ConstructorBuild {
    tool: Tool,
}

impl ConstructorBuild {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }
}

impl Default for ConstructorBuild {
    fn default() -> Self {
        Self::new(Tool::new("constructor"))
    }
}

/// First installer in `dir`, by name
fn find_installer(dir: &Path) -> Result<PathBuf> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        INSTALLER_PATTERN
    );

    let mut matches = glob::glob(&pattern)
        .map_err(|e| Error::ArtifactNotFound(format!("Invalid pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    matches.sort();

    matches
        .into_iter()
        .next()
        .ok_or_else(|| Error::ArtifactNotFound(format!("No installer matching {}", pattern)))
}

impl BuildCommand for ConstructorBuild {
    fn build(&self, recipe_dir: &Path) -> Result<PathBuf> {
        let recipe_dir = std::path::absolute(recipe_dir)?;

        // constructor writes the installer to its working directory
        run_checked(self.tool.command().arg(&recipe_dir).current_dir(&recipe_dir))?;

        let installer = find_installer(&recipe_dir)?;
        info!("constructor produced {}", installer.display());
        Ok(installer)
    }
}
