//! Tests for the 'info' and 'list' commands

use test_utils::{ConfigBuilder, LogLevel, MockResponse, MockRunner, TargetSpec, TestContext};

fn two_targets() -> TestContext {
    TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_ssh_store("nas", "nas.local", Some("borg"))
            .add_target("docs", "nas"),
    )
}

#[test]
fn test_info_only_runs_for_initialised_targets() {
    let ctx = two_targets();
    ctx.mark_initialised("docs:nas", "pw");
    let (manager, runner, logger) = ctx.manager(MockRunner::new());

    let summary = manager.info(&TargetSpec::all()).unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec!["info"]);
    assert!(calls[0].captured);
    assert_eq!(calls[0].env_var("BORG_REPO"), Some("ssh://nas.local:22/./borg"));
    assert_eq!(calls[0].env_var("BORG_RSH"), Some("ssh -o VisualHostKey=no"));
    assert!(logger.contains("target 'docs:local' has not been initialised"));
}

#[test]
fn test_list_failure_continues_batch() {
    let ctx = two_targets();
    ctx.mark_initialised("docs:nas", "pw");
    ctx.mark_initialised("docs:local", "pw");
    let (manager, runner, logger) =
        ctx.manager(MockRunner::new().expect("borg list", MockResponse::Exit(2)));

    let summary = manager.list(&"docs:".parse().unwrap()).unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(runner.call_count("borg"), 2);
    assert_eq!(logger.messages(LogLevel::Error).len(), 2);
}

#[test]
fn test_no_matching_target() {
    let ctx = two_targets();
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    assert!(manager.list(&"music:".parse().unwrap()).is_err());
    assert!(runner.calls().is_empty());
}
