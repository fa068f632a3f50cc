// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn major_version_arg() -> Arg {
    Arg::new("major_version")
        .required(true)
        .value_parser(clap::value_parser!(u64).range(1..))
        .help("Microdrop major version")
}

fn build_cli() -> Command {
    Command::new("microdrop-constructor")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Microdrop Contributors")
        .about("Build Conda packages and Miniconda installers for Microdrop releases")
        .subcommand_required(true)
        .arg(
            Arg::new("template_root")
                .long("template-root")
                .global(true)
                .value_name("DIR")
                .env("MICRODROP_TEMPLATE_ROOT")
                .help("Directory containing the recipe templates"),
        )
        .arg(
            Arg::new("index_url")
                .long("index-url")
                .global(true)
                .value_name("URL")
                .env("MICRODROP_INDEX_URL")
                .default_value("https://pypi.org")
                .help("Package index base URL"),
        )
        .arg(
            Arg::new("package")
                .long("package")
                .global(true)
                .default_value("microdrop")
                .help("Package to resolve on the index"),
        )
        .arg(
            Arg::new("release_order")
                .long("release-order")
                .global(true)
                .value_parser(["index", "version", "upload-time"])
                .default_value("index")
                .help("How to pick the latest release"),
        )
        .arg(
            Arg::new("no_pre")
                .long("no-pre")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Ignore pre-releases when resolving"),
        )
        .subcommand(
            Command::new("conda")
                .about("Build a Conda package for the latest release of a major version")
                .arg(major_version_arg())
                .arg(
                    Arg::new("output_path")
                        .required(true)
                        .help("Output file, or existing directory to place the package in"),
                )
                .arg(
                    Arg::new("conda")
                        .long("conda")
                        .env("CONDA_EXE")
                        .default_value("conda")
                        .help("conda executable"),
                ),
        )
        .subcommand(
            Command::new("installer")
                .about("Build a Miniconda installer for the latest release of a major version")
                .arg(major_version_arg())
                .arg(
                    Arg::new("output_path")
                        .required(true)
                        .help("Output file, or existing directory to place the installer in"),
                )
                .arg(
                    Arg::new("constructor")
                        .long("constructor")
                        .default_value("constructor")
                        .help("constructor executable"),
                ),
        )
        .subcommand(
            Command::new("recipe")
                .about("Generate the recipe directory without building")
                .arg(major_version_arg())
                .arg(
                    Arg::new("output_root")
                        .required(true)
                        .help("Directory to write <package>-<version>/ into"),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite existing recipe files"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the release a major version resolves to")
                .arg(major_version_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("microdrop-constructor.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
