//! End-to-end tests for the `pc` binary

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn metaprompts() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("metaprompts")
}

/// Write a config pointing at the bundled strategies and a private collections file
fn config(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("promptcatalog.yml");
    let yaml = format!(
        "catalog:\n  builtin-root: {}\ncollections:\n  path: {}\n",
        metaprompts().display(),
        temp.path().join("collections.json").display()
    );
    fs::write(&path, yaml).expect("Failed to write config");
    path
}

fn pc(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pc").expect("binary built");
    cmd.arg("--config").arg(config).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_shows_bundled_strategies() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    pc(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("star"))
        .stdout(predicate::str::contains("arpe"))
        .stdout(predicate::str::contains("comparative"));
}

#[test]
fn test_list_custom_only_is_empty() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    pc(&config)
        .args(["list", "--source", "custom"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No strategies found"));
}

#[test]
fn test_show_json() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    let output = pc(&config).args(["show", "star", "--json"]).output().unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["name"], "STAR");
    assert_eq!(doc["source"], "built-in");
    assert_eq!(doc["category"], "core");
}

#[test]
fn test_show_unknown_fails() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    pc(&config)
        .args(["show", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_missing_builtin_root_fails() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("promptcatalog.yml");
    fs::write(&config, format!("catalog:\n  builtin-root: {}\n", temp.path().join("nope").display())).unwrap();

    pc(&config)
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load strategies"));
}

#[test]
fn test_categories_json() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    let output = pc(&config).args(["categories", "--json"]).output().unwrap();
    assert!(output.status.success());
    let categories: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(categories["core"]["category"], "Core Strategies");
    assert_eq!(categories["analysis"]["strategies"][0]["key"], "comparative");
}

#[test]
fn test_collection_workflow() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    pc(&config)
        .args(["collection", "create", "demo", "--description", "Demo set"])
        .assert()
        .success();
    pc(&config).args(["collection", "add", "demo", "star"]).assert().success();
    pc(&config).args(["collection", "add", "demo", "ghost"]).assert().success();

    let output = pc(&config)
        .args(["collection", "validate", "demo", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["valid"], serde_json::json!(["star"]));
    assert_eq!(result["invalid"], serde_json::json!(["ghost"]));

    pc(&config)
        .args(["list", "--collection", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("star"))
        .stdout(predicate::str::contains("arpe").not());

    pc(&config)
        .args(["collection", "create", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_collection_export_import() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let backup = temp.path().join("backup.json");

    pc(&config).args(["collection", "create", "demo"]).assert().success();
    pc(&config).args(["collection", "add", "demo", "arpe"]).assert().success();
    pc(&config)
        .args(["collection", "export", "--output"])
        .arg(&backup)
        .assert()
        .success();
    pc(&config).args(["collection", "delete", "demo"]).assert().success();

    pc(&config)
        .args(["collection", "import"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 collections"));

    pc(&config)
        .args(["collection", "show", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("arpe"));
}

#[test]
fn test_invalid_collection_key_rejected() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    pc(&config)
        .args(["collection", "create", "bad key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid collection key"));
}
