//! Unit tests for password and marker files

use borgdrone::utils::secrets::{ensure_file, generate_password, read_secret, EnsureOutcome};
use test_utils::TestContext;

#[test]
fn test_password_file_creation_is_idempotent() {
    let ctx = TestContext::with_minimal_config();
    let path = ctx.temp_dir().join("passwd");
    let first = generate_password();

    assert_eq!(
        ensure_file(&path, first.as_bytes(), 0o600).unwrap(),
        EnsureOutcome::Created
    );
    assert_eq!(
        ensure_file(&path, generate_password().as_bytes(), 0o600).unwrap(),
        EnsureOutcome::AlreadyPresent
    );
    assert_eq!(read_secret(&path).unwrap(), first);
}

#[cfg(unix)]
#[test]
fn test_password_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::with_minimal_config();
    let path = ctx.temp_dir().join("passwd");
    ensure_file(&path, b"secret", 0o600).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0);
}

#[test]
fn test_existing_marker_is_kept() {
    let ctx = TestContext::with_minimal_config();
    let marker = ctx.create_file("docs_local/.initialised", "");

    assert_eq!(
        ensure_file(&marker, b"", 0o600).unwrap(),
        EnsureOutcome::AlreadyPresent
    );
    assert_eq!(ctx.read_file("docs_local/.initialised").unwrap(), "");
}
