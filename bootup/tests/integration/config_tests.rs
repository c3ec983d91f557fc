use super::super::common::{GitOpsDir, assert_contains, init_test_logging};

#[test]
fn test_trunk_equal_to_pr_branch_is_rejected() {
    init_test_logging();
    crate::test_log!("TEST START: test_trunk_equal_to_pr_branch_is_rejected");

    let fixture = GitOpsDir::with_requirements();
    let dir = fixture.path().to_string_lossy().to_string();
    let output = fixture.run(&["upgrade", "--dir", &dir, "--trunk", "boot_upgrade_branch"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "BU-E003");
    assert_contains(&stderr, "must differ from trunk_branch");

    crate::test_log!("TEST PASS: test_trunk_equal_to_pr_branch_is_rejected");
}

#[test]
fn test_invalid_git_kind_env_is_rejected() {
    init_test_logging();
    crate::test_log!("TEST START: test_invalid_git_kind_env_is_rejected");

    let fixture = GitOpsDir::with_requirements();
    let dir = fixture.path().to_string_lossy().to_string();
    let output = fixture
        .command()
        .env("BOOTUP_GIT_KIND", "bitbucket")
        .args(["check", "--dir", &dir])
        .output()
        .expect("Failed to run bootup");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "BU-E004");
    assert_contains(&stderr, "BOOTUP_GIT_KIND");

    crate::test_log!("TEST PASS: test_invalid_git_kind_env_is_rejected");
}

#[test]
fn test_unknown_config_key_is_parse_error() {
    init_test_logging();
    crate::test_log!("TEST START: test_unknown_config_key_is_parse_error");

    let fixture = GitOpsDir::with_requirements();
    let config = fixture.write_config("trunk_branch = \"main\"\npr_colour = \"blue\"\n");
    let dir = fixture.path().to_string_lossy().to_string();
    let config = config.to_string_lossy().to_string();
    let output = fixture.run(&["check", "--dir", &dir, "--config", &config]);

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "BU-E002");

    crate::test_log!("TEST PASS: test_unknown_config_key_is_parse_error");
}

#[test]
fn test_missing_explicit_config_is_read_error() {
    init_test_logging();

    let fixture = GitOpsDir::with_requirements();
    let dir = fixture.path().to_string_lossy().to_string();
    let missing = fixture.config_home.path().join("nope.toml");
    let output = fixture.run(&["check", "--dir", &dir, "--config", &missing.to_string_lossy()]);

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "BU-E001");
}
