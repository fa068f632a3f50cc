// tests/integration_test.rs

//! Integration tests for microdrop-constructor
//!
//! These tests drive the full resolve → render → build → copy pipeline
//! with an in-memory index and stand-in build commands.

use microdrop_constructor::build::{self, BuildConfig, BuildCommand};
use microdrop_constructor::index::StaticIndex;
use microdrop_constructor::recipe::{self, RecipeOptions};
use microdrop_constructor::Error;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    templates: TempDir,
    scratch: TempDir,
    out: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let templates = tempfile::tempdir().unwrap();
        fs::write(
            templates.path().join("meta.yaml"),
            "package:\n  name: {{ conda_package_name }}\n  version: {{ version }}\n",
        )
        .unwrap();
        fs::write(templates.path().join("bld.bat"), "pip install {% oops").unwrap();

        Self {
            templates,
            scratch: tempfile::tempdir().unwrap(),
            out: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self) -> BuildConfig {
        let mut config = BuildConfig::new(self.templates.path());
        config.package_name = "pkg".to_string();
        config.scratch_parent = Some(self.scratch.path().to_path_buf());
        config
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

/// Build command that writes `<recipe>/pkg-<version>.tar.bz2` from meta.yaml
fn fake_archive(recipe_dir: &Path) -> microdrop_constructor::Result<PathBuf> {
    let meta = fs::read_to_string(recipe_dir.join("meta.yaml"))?;
    let version = meta
        .lines()
        .find_map(|line| line.trim().strip_prefix("version: "))
        .unwrap()
        .to_string();
    let artifact = recipe_dir.join(format!("pkg-{}.tar.bz2", version));
    fs::write(&artifact, meta)?;
    Ok(artifact)
}

#[test]
fn test_build_into_output_directory() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["2.9", "3.1.0", "4.0"]);
    let seen = RefCell::new(None);

    let command = |recipe_dir: &Path| {
        *seen.borrow_mut() = Some(recipe_dir.to_path_buf());
        fake_archive(recipe_dir)
    };

    let built = build::build_template(&fixture.config(), &index, 3, fixture.out.path(), &command)
        .unwrap();

    assert_eq!(built, fixture.out.path().join("pkg-3.1.0.tar.bz2"));
    let content = fs::read_to_string(&built).unwrap();
    assert!(content.contains("name: pkg-3.0"));
    assert!(content.contains("version: 3.1.0"));

    let recipe_dir = seen.into_inner().unwrap();
    assert_eq!(recipe_dir.file_name().unwrap(), "pkg-3.1.0");
    assert!(!recipe_dir.exists());
    assert!(fixture.scratch_is_empty(), "scratch workspace should be removed");
}

#[test]
fn test_build_renames_to_output_file() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);
    let target = fixture.out.path().join("renamed.tar.bz2");

    let built = build::build_template(&fixture.config(), &index, 3, &target, &fake_archive).unwrap();

    assert_eq!(built, target);
    assert!(target.is_file());
    assert!(!fixture.out.path().join("pkg-3.1.0.tar.bz2").exists());
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_build_recipe_contents() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["3.0", "3.2rc1"]);

    let command = |recipe_dir: &Path| -> microdrop_constructor::Result<PathBuf> {
        let entries: Vec<_> = fs::read_dir(recipe_dir.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1, "exactly one recipe directory is generated");

        // unparseable template is copied untouched
        assert_eq!(
            fs::read_to_string(recipe_dir.join("bld.bat")).unwrap(),
            "pip install {% oops"
        );
        fake_archive(recipe_dir)
    };

    let built = build::build_template(&fixture.config(), &index, 3, fixture.out.path(), &command)
        .unwrap();
    assert_eq!(built.file_name().unwrap(), "pkg-3.2rc1.tar.bz2");
}

#[test]
fn test_build_command_failure_cleans_scratch() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);

    let command = |_: &Path| -> microdrop_constructor::Result<PathBuf> {
        Err(Error::BuildCommandError {
            command: "conda build".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "boom".to_string(),
        })
    };

    let result = build::build_template(&fixture.config(), &index, 3, fixture.out.path(), &command);

    assert!(matches!(result, Err(Error::BuildCommandError { .. })));
    assert!(fixture.scratch_is_empty());
    assert_eq!(fs::read_dir(fixture.out.path()).unwrap().count(), 0);
}

#[test]
fn test_copy_failure_cleans_scratch() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);
    let target = fixture.out.path().join("missing/renamed.tar.bz2");

    let result = build::build_template(&fixture.config(), &index, 3, &target, &fake_archive);

    assert!(matches!(result, Err(Error::CopyError { .. })));
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_resolution_failure_never_creates_scratch() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["2.0", "4.0"]);
    let called = RefCell::new(false);

    let command = |recipe_dir: &Path| {
        *called.borrow_mut() = true;
        fake_archive(recipe_dir)
    };

    let result = build::build_template(&fixture.config(), &index, 3, fixture.out.path(), &command);

    assert!(matches!(result, Err(Error::ResolutionError(_))));
    assert!(!*called.borrow());
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_undefined_variable_renders_empty() {
    let fixture = Fixture::new();
    fs::write(
        fixture.templates.path().join("build.sh"),
        "echo {{ PREFIX }} {{ version }}",
    )
    .unwrap();
    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);

    let command = |recipe_dir: &Path| {
        assert_eq!(
            fs::read_to_string(recipe_dir.join("build.sh")).unwrap(),
            "echo  3.1.0"
        );
        fake_archive(recipe_dir)
    };

    let built = build::build_template(&fixture.config(), &index, 3, fixture.out.path(), &command)
        .unwrap();
    assert!(built.is_file());
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_render_failure_cleans_scratch() {
    let fixture = Fixture::new();
    fs::write(
        fixture.templates.path().join("extra.txt"),
        "{{ environ.get('UNDEFINED') }}",
    )
    .unwrap();
    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);

    let result =
        build::build_template(&fixture.config(), &index, 3, fixture.out.path(), &fake_archive);

    assert!(matches!(result, Err(Error::TemplateError { .. })));
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_bundled_templates_render() {
    let template_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("static/conda.microdrop.template");
    let out = tempfile::tempdir().unwrap();
    let index = StaticIndex::new().with_package("microdrop", ["2.0", "2.13.1"]);
    let config = BuildConfig::new(&template_root);

    let recipe = recipe::generate_recipe(
        &index,
        &config.specifier(2).unwrap(),
        &config.conda_package_name(2),
        &template_root,
        out.path(),
        &RecipeOptions::default(),
    )
    .unwrap();

    assert_eq!(recipe.dir, out.path().join("microdrop-2.13.1"));

    let meta = fs::read_to_string(recipe.dir.join("meta.yaml")).unwrap();
    assert!(meta.contains("name: microdrop-2.0"));
    assert!(meta.contains("version: 2.13.1"));

    let construct = fs::read_to_string(recipe.dir.join("construct.yaml")).unwrap();
    assert!(construct.contains("microdrop-2.0 ==2.13.1"));

    for file in &recipe.files {
        let name = file.file_name().unwrap();
        assert!(template_root.join(name).is_file());
    }
}

#[test]
fn test_generate_recipe_twice_requires_force() {
    let fixture = Fixture::new();
    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);
    let config = fixture.config();
    let spec = config.specifier(3).unwrap();

    let generate = |overwrite| {
        recipe::generate_recipe(
            &index,
            &spec,
            "pkg-3.0",
            fixture.templates.path(),
            fixture.out.path(),
            &RecipeOptions {
                overwrite,
                ..RecipeOptions::default()
            },
        )
    };

    let first = generate(false).unwrap();
    let original = fs::read(first.dir.join("meta.yaml")).unwrap();

    assert!(matches!(generate(false), Err(Error::OutputExistsError(_))));
    assert_eq!(fs::read(first.dir.join("meta.yaml")).unwrap(), original);

    let second = generate(true).unwrap();
    assert_eq!(fs::read(second.dir.join("meta.yaml")).unwrap(), original);
}

#[cfg(unix)]
#[test]
fn test_conda_package_with_stand_in_tool() {
    use microdrop_constructor::build::{CondaBuild, Tool};

    let fixture = Fixture::new();
    let bin = tempfile::tempdir().unwrap();
    let script = bin.path().join("conda");
    fs::write(
        &script,
        r#"#!/bin/sh
if [ "$2" = "--output" ]; then
    echo "$3/pkg-3.0-3.1.0-0.tar.bz2"
else
    cp "$2/meta.yaml" "$2/pkg-3.0-3.1.0-0.tar.bz2"
fi
"#,
    )
    .unwrap();

    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);
    let conda = CondaBuild::new(Tool::new("sh").arg(&script));

    let built =
        build::build_conda_package(&fixture.config(), &index, 3, fixture.out.path(), &conda)
            .unwrap();

    assert_eq!(built, fixture.out.path().join("pkg-3.0-3.1.0-0.tar.bz2"));
    assert!(fs::read_to_string(&built).unwrap().contains("version: 3.1.0"));
    assert!(fixture.scratch_is_empty());
}

#[cfg(unix)]
#[test]
fn test_installer_with_stand_in_tool() {
    use microdrop_constructor::build::{ConstructorBuild, Tool};

    let fixture = Fixture::new();
    let bin = tempfile::tempdir().unwrap();
    let script = bin.path().join("constructor");
    fs::write(&script, "#!/bin/sh\necho installer > Pkg-3.1.0-Windows-x86_64.exe\n").unwrap();

    let index = StaticIndex::new().with_package("pkg", ["3.1.0"]);
    let constructor = ConstructorBuild::new(Tool::new("sh").arg(&script));
    let target = fixture.out.path().join("pkg-setup.exe");

    let built =
        build::build_miniconda_installer(&fixture.config(), &index, 3, &target, &constructor)
            .unwrap();

    assert_eq!(built, target);
    assert_eq!(fs::read_to_string(&target).unwrap(), "installer\n");
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_closures_are_build_commands() {
    fn assert_build_command<C: BuildCommand>(_: &C) {}
    assert_build_command(&fake_archive);
}
