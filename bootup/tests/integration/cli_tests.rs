use super::super::common::{GitOpsDir, assert_contains, init_test_logging};

#[test]
fn test_help_lists_subcommands() {
    init_test_logging();
    crate::test_log!("TEST START: test_help_lists_subcommands");

    let fixture = GitOpsDir::empty();
    let output = fixture.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "upgrade");
    assert_contains(&stdout, "check");

    crate::test_log!("TEST PASS: test_help_lists_subcommands");
}

#[test]
fn test_upgrade_help_lists_flags() {
    init_test_logging();
    crate::test_log!("TEST START: test_upgrade_help_lists_flags");

    let fixture = GitOpsDir::empty();
    let output = fixture.run(&["upgrade", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--dir",
        "--config",
        "--boot-config-url",
        "--trunk",
        "--dev-env-url",
        "--namespace",
        "--verbose",
        "--log-format",
    ] {
        assert_contains(&stdout, flag);
    }

    crate::test_log!("TEST PASS: test_upgrade_help_lists_flags");
}

#[test]
fn test_unknown_log_format_is_usage_error() {
    init_test_logging();
    crate::test_log!("TEST START: test_unknown_log_format_is_usage_error");

    let fixture = GitOpsDir::empty();
    let output = fixture.run(&["check", "--log-format", "xml"]);
    assert_eq!(output.status.code(), Some(2));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "unknown log format");

    crate::test_log!("TEST PASS: test_unknown_log_format_is_usage_error");
}

#[test]
fn test_version_flag() {
    init_test_logging();

    let fixture = GitOpsDir::empty();
    let output = fixture.run(&["--version"]);
    assert!(output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stdout), env!("CARGO_PKG_VERSION"));
}
