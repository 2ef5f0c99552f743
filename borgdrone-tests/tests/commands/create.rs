//! Tests for the 'create' command

use test_utils::{
    ConfigBuilder, MockResponse, MockRunner, PruneOptions, TargetSpec, TestContext,
};

fn maintained(upload: Option<&str>) -> TestContext {
    TestContext::from_builder(
        ConfigBuilder::new()
            .add_filesystem_store("usb", std::path::Path::new("/mnt/usb"))
            .add_ssh_store("nas", "nas.local", None)
            .add_archive(
                "docs",
                vec!["/srv/docs".to_string()],
                vec!["/srv/docs/cache".to_string(), "*.tmp".to_string()],
            )
            .add_maintained_target(
                "docs",
                "usb",
                PruneOptions {
                    keep_daily: Some(7),
                    keep_yearly: Some(1),
                    ..PruneOptions::default()
                },
                upload,
            )
            .add_maintained_target("docs", "nas", PruneOptions::default(), upload),
    )
}

fn spec(s: &str) -> TargetSpec {
    s.parse().unwrap()
}

#[test]
fn test_create_arguments() {
    let ctx = maintained(None);
    ctx.mark_initialised("docs:usb", "pw");
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    manager.create(&spec("docs:usb")).unwrap();

    assert_eq!(
        runner.call_args()[0],
        vec![
            "create",
            "--stats",
            "--compression",
            "lz4",
            "--exclude",
            "/srv/docs/cache",
            "--exclude",
            "*.tmp",
            "::{now}",
            "/srv/docs",
        ]
    );
}

#[test]
fn test_create_then_prune_compact_and_upload() {
    let ctx = maintained(Some("b2:bucket/docs"));
    ctx.mark_initialised("docs:usb", "pw");
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    let summary = manager.create(&spec("docs:usb")).unwrap();
    assert_eq!(summary.succeeded, 1);

    let args = runner.call_args();
    assert_eq!(args.len(), 4);
    assert_eq!(args[1], vec!["prune", "--keep-daily", "7", "--keep-yearly", "1"]);
    assert_eq!(args[2], vec!["compact"]);
    assert_eq!(args[3], vec!["sync", "/mnt/usb/docs", "b2:bucket/docs"]);
    assert_eq!(runner.call_count("rclone"), 1);
    assert!(runner.calls().iter().all(|call| !call.captured));
}

#[test]
fn test_create_without_prune_counts_skips_prune() {
    let ctx = maintained(Some("b2:bucket/docs"));
    ctx.mark_initialised("docs:nas", "pw");
    let (manager, runner, logger) = ctx.manager(MockRunner::new());

    manager.create(&spec("docs:nas")).unwrap();

    let subcommands: Vec<String> = runner
        .calls()
        .iter()
        .filter_map(|c| c.subcommand().map(str::to_string))
        .collect();
    assert_eq!(subcommands, vec!["create", "compact"]);
    assert!(logger.contains("Skipping upload for docs:nas"));
}

#[test]
fn test_failed_create_skips_follow_ups_and_continues() {
    let ctx = maintained(Some("b2:bucket/docs"));
    ctx.mark_initialised("docs:usb", "pw");
    ctx.mark_initialised("docs:nas", "pw");
    let (manager, runner, _logger) =
        ctx.manager(MockRunner::new().expect("borg create", MockResponse::Exit(2)));

    let summary = manager.create(&spec("docs:")).unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(runner.calls().len(), 2);
}

#[test]
fn test_failed_upload_marks_target_failed() {
    let ctx = maintained(Some("b2:bucket/docs"));
    ctx.mark_initialised("docs:usb", "pw");
    let (manager, _runner, _logger) =
        ctx.manager(MockRunner::new().expect("rclone", MockResponse::Exit(1)));

    let summary = manager.create(&spec("docs:usb")).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 0);
}

#[test]
fn test_create_skips_uninitialised() {
    let ctx = maintained(None);
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    let summary = manager.create(&TargetSpec::all()).unwrap();
    assert_eq!(summary.skipped, 2);
    assert!(runner.calls().is_empty());
}
