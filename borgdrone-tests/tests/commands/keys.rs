//! Tests for the 'export-key' and 'import-key' commands

use borgdrone::config::ResolutionError;
use borgdrone::managers::target::exit_code_for;
use test_utils::{MockResponse, MockRunner, TargetSpec, TestContext};

fn spec(s: &str) -> TargetSpec {
    s.parse().unwrap()
}

#[test]
fn test_export_key_writes_both_formats() {
    let ctx = TestContext::with_minimal_config();
    ctx.mark_initialised("docs:local", "hunter2\n");
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    let report = manager.export_key(&spec("docs:local")).unwrap();

    let paths = ctx.paths("docs:local");
    assert_eq!(report.passwords["docs:local"], "hunter2");
    assert_eq!(report.files, vec![paths.keyfile(), paths.paper_keyfile()]);

    let args = runner.call_args();
    assert_eq!(
        args[0],
        vec![
            "key".to_string(),
            "export".to_string(),
            "--paper".to_string(),
            "::".to_string(),
            paths.paper_keyfile().display().to_string(),
        ]
    );
    assert_eq!(
        args[1],
        vec![
            "key".to_string(),
            "export".to_string(),
            "::".to_string(),
            paths.keyfile().display().to_string(),
        ]
    );
}

#[test]
fn test_export_key_skips_uninitialised() {
    let ctx = TestContext::with_minimal_config();
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    let report = manager.export_key(&TargetSpec::all()).unwrap();
    assert!(report.passwords.is_empty());
    assert_eq!(report.summary.skipped, 1);
    assert!(runner.calls().is_empty());
}

#[test]
fn test_export_key_failure_omits_password() {
    let ctx = TestContext::with_minimal_config();
    ctx.mark_initialised("docs:local", "pw");
    let (manager, runner, _logger) =
        ctx.manager(MockRunner::new().expect("borg key", MockResponse::Exit(2)));

    let report = manager.export_key(&spec("docs:local")).unwrap();
    assert!(report.passwords.is_empty());
    assert_eq!(report.summary.failed, 1);
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn test_export_key_unreadable_password_exit_three() {
    let ctx = TestContext::with_minimal_config();
    ctx.mark_initialised("docs:local", "pw");
    std::fs::remove_file(ctx.paths("docs:local").password_file()).unwrap();
    let (manager, _runner, _logger) = ctx.manager(MockRunner::new());

    let err = manager.export_key(&spec("docs:local")).unwrap_err();
    assert_eq!(exit_code_for(&err), 3);
}

#[test]
fn test_import_key_for_new_target() {
    let ctx = TestContext::with_minimal_config();
    let password = ctx.create_file("import/passwd", "restored\n");
    let keyfile = ctx.create_file("import/keyfile.bin", "KEY");
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    manager
        .import_key(&spec("docs:local"), &keyfile, Some(&password), false)
        .unwrap();

    let paths = ctx.paths("docs:local");
    assert!(paths.is_initialised());
    assert_eq!(
        std::fs::read_to_string(paths.password_file()).unwrap(),
        "restored\n"
    );
    assert_eq!(
        runner.call_args()[0],
        vec![
            "key".to_string(),
            "import".to_string(),
            "::".to_string(),
            keyfile.display().to_string(),
        ]
    );
}

#[test]
fn test_import_key_keeps_existing_password() {
    let ctx = TestContext::with_minimal_config();
    ctx.mark_initialised("docs:local", "original");
    let password = ctx.create_file("import/passwd", "restored");
    let keyfile = ctx.create_file("import/keyfile.txt", "KEY");
    let (manager, _runner, logger) = ctx.manager(MockRunner::new());

    manager
        .import_key(&spec("docs:local"), &keyfile, Some(&password), true)
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(ctx.paths("docs:local").password_file()).unwrap(),
        "original"
    );
    assert!(logger.contains("already has a password file"));
}

#[test]
fn test_import_key_without_any_password_fails() {
    let ctx = TestContext::with_minimal_config();
    let keyfile = ctx.create_file("keyfile.bin", "KEY");
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    assert!(manager
        .import_key(&spec("docs:local"), &keyfile, None, false)
        .is_err());
    assert!(runner.calls().is_empty());
}

#[test]
fn test_import_key_rejects_wildcards() {
    let ctx = TestContext::with_minimal_config();
    let keyfile = ctx.create_file("keyfile.bin", "KEY");
    let (manager, _runner, _logger) = ctx.manager(MockRunner::new());

    let err = manager
        .import_key(&spec(":local"), &keyfile, None, false)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResolutionError>(),
        Some(ResolutionError::IncompleteTargetSpec(_))
    ));
    assert_eq!(exit_code_for(&err), 1);
}
