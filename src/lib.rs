// src/lib.rs

//! Microdrop Conda Constructor
//!
//! Builds Conda packages and Miniconda installers for the latest release of
//! a Microdrop major version.
//!
//! # Pipeline
//!
//! - Index: resolve the newest release matching `microdrop>=N.0,<N+1.0`
//! - Recipe: render the recipe template directory for that release
//! - Build: run `conda build` or `constructor` in a scratch workspace
//!   and copy the artifact to its destination

pub mod build;
mod error;
pub mod index;
pub mod recipe;
pub mod version;

pub use error::{Error, Result};
