//! Integration tests for the build command, run over real project trees.

use std::fs;

use tempfile::TempDir;

use kiln_cli::cli::BuildArgs;
use kiln_cli::commands::build;

fn scaffold_project(temp: &TempDir) {
    fs::write(
        temp.path().join("index.html"),
        "<html><head></head><body><script src=\"src/app.js\"></script></body></html>",
    )
    .unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/app.js"), "var a = 1;").unwrap();
}

#[tokio::test]
async fn build_command_builds_every_configured_variant() {
    let temp = TempDir::new().unwrap();
    scaffold_project(&temp);
    fs::write(
        temp.path().join("kiln.toml"),
        r#"
        [[builds]]
        name = "dev"

        [[builds]]
        name = "prod"
        html = { minify = true }
        "#,
    )
    .unwrap();

    let args = BuildArgs {
        root: temp.path().to_path_buf(),
        build_dir: temp.path().join("build"),
        name: None,
    };
    build::execute(args).await.unwrap();

    assert!(temp.path().join("build/dev/index.html").is_file());
    assert!(temp.path().join("build/prod/index.html").is_file());
}

#[tokio::test]
async fn name_filter_builds_a_single_variant() {
    let temp = TempDir::new().unwrap();
    scaffold_project(&temp);
    fs::write(
        temp.path().join("kiln.toml"),
        "[[builds]]\nname = \"dev\"\n\n[[builds]]\nname = \"prod\"",
    )
    .unwrap();

    let args = BuildArgs {
        root: temp.path().to_path_buf(),
        build_dir: temp.path().join("build"),
        name: Some("prod".to_string()),
    };
    build::execute(args).await.unwrap();

    assert!(temp.path().join("build/prod/index.html").is_file());
    assert!(!temp.path().join("build/dev").exists());
}

#[tokio::test]
async fn unknown_variant_name_is_an_error() {
    let temp = TempDir::new().unwrap();
    scaffold_project(&temp);
    fs::write(temp.path().join("kiln.toml"), "[[builds]]\nname = \"dev\"").unwrap();

    let args = BuildArgs {
        root: temp.path().to_path_buf(),
        build_dir: temp.path().join("build"),
        name: Some("missing".to_string()),
    };
    assert!(build::execute(args).await.is_err());
}

#[tokio::test]
async fn missing_config_is_an_error() {
    let temp = TempDir::new().unwrap();
    let args = BuildArgs {
        root: temp.path().to_path_buf(),
        build_dir: temp.path().join("build"),
        name: None,
    };
    assert!(build::execute(args).await.is_err());
}
