//! Command tests for borgdrone
//!
//! These tests drive `TargetManager` with a mocked runner.

mod clean;
mod create;
mod keys;
mod query;
