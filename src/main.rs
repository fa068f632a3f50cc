// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use microdrop_constructor::build::{self, BuildConfig, CondaBuild, ConstructorBuild, Tool};
use microdrop_constructor::index::{self, PypiIndex, ReleaseOrder, DEFAULT_INDEX_URL};
use microdrop_constructor::recipe::{self, RecipeOptions};
use std::path::PathBuf;
use tracing::info;

/// Bundled recipe templates
const DEFAULT_TEMPLATE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static/conda.microdrop.template");

#[derive(Parser)]
#[command(name = "microdrop-constructor")]
#[command(author, version, about = "Build Conda packages and Miniconda installers for Microdrop releases", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOptions {
    /// Directory containing the recipe templates
    #[arg(long, global = true, env = "MICRODROP_TEMPLATE_ROOT", default_value = DEFAULT_TEMPLATE_ROOT)]
    template_root: PathBuf,

    /// Package index base URL
    #[arg(long, global = true, env = "MICRODROP_INDEX_URL", default_value = DEFAULT_INDEX_URL)]
    index_url: String,

    /// Package to resolve on the index
    #[arg(long, global = true, default_value = build::DEFAULT_PACKAGE_NAME)]
    package: String,

    /// How to pick the latest release (index, version, upload-time)
    #[arg(long, global = true, default_value = "index")]
    release_order: ReleaseOrder,

    /// Ignore pre-releases when resolving
    #[arg(long, global = true)]
    no_pre: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a Conda package for the latest release of a major version
    Conda {
        /// Microdrop major version
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        major_version: u64,
        /// Output file, or existing directory to place the package in
        output_path: PathBuf,
        /// conda executable
        #[arg(long, env = "CONDA_EXE", default_value = "conda")]
        conda: PathBuf,
    },
    /// Build a Miniconda installer for the latest release of a major version
    Installer {
        /// Microdrop major version
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        major_version: u64,
        /// Output file, or existing directory to place the installer in
        output_path: PathBuf,
        /// constructor executable
        #[arg(long, default_value = "constructor")]
        constructor: PathBuf,
    },
    /// Generate the recipe directory without building
    Recipe {
        /// Microdrop major version
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        major_version: u64,
        /// Directory to write `<package>-<version>/` into
        output_root: PathBuf,
        /// Overwrite existing recipe files
        #[arg(short, long)]
        force: bool,
    },
    /// Print the release a major version resolves to
    Resolve {
        /// Microdrop major version
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        major_version: u64,
    },
}

impl GlobalOptions {
    fn build_config(&self) -> BuildConfig {
        let mut config = BuildConfig::new(&self.template_root);
        config.package_name = self.package.clone();
        config.include_prereleases = !self.no_pre;
        config.release_order = self.release_order;
        config
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.options.build_config();
    let index = PypiIndex::new(&cli.options.index_url)?;

    match cli.command {
        Commands::Conda {
            major_version,
            output_path,
            conda,
        } => {
            info!("Building Conda package for {}", config.specifier(major_version)?);
            let built = build::build_conda_package(
                &config,
                &index,
                major_version,
                &output_path,
                &CondaBuild::new(Tool::new(conda)),
            )
            .with_context(|| format!("Conda package build for major version {} failed", major_version))?;

            println!("{}", built.display());
            Ok(())
        }
        Commands::Installer {
            major_version,
            output_path,
            constructor,
        } => {
            info!("Building Miniconda installer for {}", config.specifier(major_version)?);
            let built = build::build_miniconda_installer(
                &config,
                &index,
                major_version,
                &output_path,
                &ConstructorBuild::new(Tool::new(constructor)),
            )
            .with_context(|| format!("Installer build for major version {} failed", major_version))?;

            println!("{}", built.display());
            Ok(())
        }
        Commands::Recipe {
            major_version,
            output_root,
            force,
        } => {
            let options = RecipeOptions {
                overwrite: force,
                include_prereleases: config.include_prereleases,
                release_order: config.release_order,
            };

            let generated = recipe::generate_recipe(
                &index,
                &config.specifier(major_version)?,
                &config.conda_package_name(major_version),
                &config.template_root,
                &output_root,
                &options,
            )?;

            println!("{}", generated.dir.display());
            for file in &generated.files {
                info!("  {}", file.display());
            }
            Ok(())
        }
        Commands::Resolve { major_version } => {
            let resolved = index::resolve(
                &index,
                &config.specifier(major_version)?,
                config.include_prereleases,
                config.release_order,
            )?;

            println!("{} {}", resolved.name, resolved.version);
            Ok(())
        }
    }
}
