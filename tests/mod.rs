//! Integration tests for streamwatch
//!
//! Tests are organized by component:
//! - provider_test: URL classification
//! - registry_test: membership, ordering, duplicates
//! - status_test: status API client against a mock server
//! - refresh_test: refresh sweeps through a session
//! - launcher_test: player processes (unix only)
//! - store_test: stream list, settings and player logs on disk
//! - cli_test: argument and monitor command parsing

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
