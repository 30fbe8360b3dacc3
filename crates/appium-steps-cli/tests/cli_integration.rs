use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn appium_steps() -> Command {
    Command::cargo_bin("appium-steps").unwrap()
}

/// Scratch directory removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("appium-steps-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[test]
fn test_help_exits_zero() {
    appium_steps()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("appium-steps"));
}

// ---------------------------------------------------------------------------
// steps
// ---------------------------------------------------------------------------

#[test]
fn test_steps_text_lists_builtins_by_tag() {
    appium_steps()
        .arg("steps")
        .assert()
        .success()
        .stdout(predicate::str::contains("navigation (16)"))
        .stdout(predicate::str::contains("I tap on {string}"))
        .stdout(predicate::str::contains("I wait until {string} is displayed"));
}

#[test]
fn test_steps_json_catalog() {
    let assert = appium_steps()
        .args(["steps", "--format", "json"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 48);
    let tap = steps.iter().find(|s| s["label"] == "I tap on {string}").unwrap();
    assert_eq!(tap["insertText"], "I tap on \"${1:text}\"");
    assert_eq!(tap["detail"], "Appium BDD Step");
}

#[test]
fn test_steps_tag_filter() {
    let assert = appium_steps()
        .args(["--format", "json", "steps", "--tag", "input"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s["tag"] == "input"));
}

#[test]
fn test_steps_unknown_tag_is_rejected() {
    appium_steps()
        .args(["steps", "--tag", "teleport"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown tag"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn test_check_valid_feature() {
    appium_steps()
        .args(["check", fixture_path("valid.feature").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 16 step(s) in 1 file(s), 0 unresolved"));
}

#[test]
fn test_check_broken_feature_exits_one() {
    appium_steps()
        .args(["check", fixture_path("broken.feature").to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("broken.feature:5: undefined"))
        .stdout(predicate::str::contains("broken.feature:6: coercion"))
        .stderr(predicate::str::contains("2 steps did not resolve"));
}

#[test]
fn test_check_directory_json() {
    let assert = appium_steps()
        .args(["check", "--format", "json", fixture_path("").to_str().unwrap()])
        .assert()
        .code(1);
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["files"], 2);
    assert_eq!(json["steps"], 20);
    let failures = json["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["step"], "I teleport to \"~mars\"");
    assert_eq!(failures[1]["kind"], "coercion");
}

#[test]
fn test_check_invalid_gherkin_exits_one() {
    let scratch = Scratch::new();
    let file = scratch.path().join("notes.feature");
    std::fs::write(&file, "just some notes\n").unwrap();
    appium_steps()
        .args(["check", file.to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("notes.feature: invalid feature file"))
        .stderr(predicate::str::contains("1 feature file(s) could not be parsed"));
}

#[test]
fn test_check_pattern_matching_nothing() {
    let scratch = Scratch::new();
    let pattern = scratch.path().join("*.feature");
    appium_steps()
        .args(["check", pattern.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No feature files match"));
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn test_init_typescript_with_flag() {
    let project = Scratch::new();
    let shipped = Scratch::new();
    appium_steps()
        .args(["init", "--ts", "--dir"])
        .arg(project.path())
        .arg("--package-root")
        .arg(shipped.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initializing TypeScript project"))
        .stderr(predicate::str::contains("sample app not found"));

    for file in ["wdio.conf.ts", "tsconfig.json", "features/support/hooks.ts", "package.json"] {
        assert!(project.path().join(file).is_file(), "{} missing", file);
    }
    assert!(project.path().join("features/scenarios").is_dir());
}

#[test]
fn test_init_prompts_when_no_language_flag() {
    let project = Scratch::new();
    let shipped = Scratch::new();
    appium_steps()
        .arg("init")
        .arg("--dir")
        .arg(project.path())
        .arg("--package-root")
        .arg(shipped.path())
        .write_stdin("no\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Do you want to use TypeScript?"));

    assert!(project.path().join("wdio.conf.js").is_file());
    assert!(!project.path().join("tsconfig.json").exists());
}

#[test]
fn test_init_rejects_both_languages() {
    appium_steps()
        .args(["init", "--ts", "--js"])
        .assert()
        .failure();
}

#[test]
fn test_init_copies_shipped_scenarios() {
    let project = Scratch::new();
    let shipped = Scratch::new();
    std::fs::create_dir_all(shipped.path().join("test-scenarios")).unwrap();
    std::fs::copy(
        fixture_path("valid.feature"),
        shipped.path().join("test-scenarios/valid.feature"),
    )
    .unwrap();

    appium_steps()
        .args(["init", "--js", "--dir"])
        .arg(project.path())
        .arg("--package-root")
        .arg(shipped.path())
        .assert()
        .success();

    let copied = project.path().join("features/scenarios/valid.feature");
    assert!(copied.is_file());

    // The scaffolded scenarios check clean.
    appium_steps()
        .arg("check")
        .arg(project.path().join("features"))
        .assert()
        .success();
}
