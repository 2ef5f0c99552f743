//! Unit tests for borgdrone
//!
//! These tests exercise the library's public API without spawning borg.

mod resolver;
mod runner;
mod secrets;
