//! Integration test crate for the hive signaling service.
//!
//! This crate has no library code. It only contains scenario tests that
//! drive the tracker across crate boundaries, without network I/O.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p hive-integration-tests
//! ```
