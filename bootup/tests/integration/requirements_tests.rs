use super::super::common::fixtures::git_available;
use super::super::common::{GitOpsDir, assert_contains, assert_path_exists, init_test_logging};
use std::fs;

#[test]
fn test_missing_requirements_fails_with_hint() {
    init_test_logging();
    crate::test_log!("TEST START: test_missing_requirements_fails_with_hint");
    if !git_available() {
        crate::test_log!("TEST SKIP: git not installed");
        return;
    }

    let fixture = GitOpsDir::empty();
    let dir = fixture.path().to_string_lossy().to_string();
    let output = fixture.run(&["upgrade", "--dir", &dir]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "BU-E010");
    assert_contains(&stderr, "failed to read the requirements document");
    assert_contains(&stderr, "inside a GitOps clone");

    crate::test_log!("TEST PASS: test_missing_requirements_fails_with_hint");
}

#[test]
fn test_check_honours_requirements_file_override() {
    init_test_logging();
    crate::test_log!("TEST START: test_check_honours_requirements_file_override");
    if !git_available() {
        crate::test_log!("TEST SKIP: git not installed");
        return;
    }

    let fixture = GitOpsDir::with_requirements();
    let dir = fixture.path().to_string_lossy().to_string();
    let output = fixture
        .command()
        .env("BOOTUP_REQUIREMENTS_FILE", "requirements.yml")
        .args(["check", "--dir", &dir, "--json"])
        .output()
        .expect("Failed to run bootup");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "BU-E010");
    assert_contains(&stderr, "requirements.yml");
    assert!(output.stdout.is_empty());

    crate::test_log!("TEST PASS: test_check_honours_requirements_file_override");
}

#[test]
fn test_requirements_without_version_stream_is_parse_error() {
    init_test_logging();
    if !git_available() {
        crate::test_log!("TEST SKIP: git not installed");
        return;
    }

    let fixture = GitOpsDir::empty();
    fs::write(fixture.requirements_path(), "cluster:\n  provider: gke\n").unwrap();
    let dir = fixture.path().to_string_lossy().to_string();
    let output = fixture.run(&["upgrade", "--dir", &dir]);

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "BU-E011");
    assert_path_exists(&fixture.requirements_path());
    assert_eq!(
        fs::read_to_string(fixture.requirements_path()).unwrap(),
        "cluster:\n  provider: gke\n"
    );
}
