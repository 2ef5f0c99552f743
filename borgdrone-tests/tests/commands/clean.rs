//! Tests for the 'clean' command

use test_utils::{ConfigBuilder, MockRunner, TestContext};

#[test]
fn test_clean_removes_only_key_files() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_ssh_store("nas", "nas.local", None)
            .add_target("docs", "nas"),
    );
    ctx.mark_initialised("docs:local", "pw");
    ctx.mark_initialised("docs:nas", "pw");
    for name in ["docs:local", "docs:nas"] {
        let paths = ctx.paths(name);
        std::fs::write(paths.keyfile(), "bin").unwrap();
        std::fs::write(paths.paper_keyfile(), "txt").unwrap();
    }
    let (manager, runner, _logger) = ctx.manager(MockRunner::new());

    assert_eq!(manager.clean(), 4);

    let paths = ctx.paths("docs:local");
    assert!(!paths.keyfile().exists());
    assert!(!paths.paper_keyfile().exists());
    assert!(paths.password_file().exists());
    assert!(paths.is_initialised());
    assert!(runner.calls().is_empty());
}

#[test]
fn test_clean_with_nothing_exported() {
    let ctx = TestContext::with_minimal_config();
    let (manager, _runner, _logger) = ctx.manager(MockRunner::new());

    assert_eq!(manager.clean(), 0);
}
