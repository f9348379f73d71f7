//! Shared storage integration tests.
//!
//! Tests the CursorStore and CommandStore interfaces against all
//! implementations. Each implementation module imports these test functions
//! and runs them.

pub mod command_store_tests;
pub mod cursor_store_tests;
