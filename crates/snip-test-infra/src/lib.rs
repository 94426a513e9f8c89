//! Container fixtures for snip integration tests.
//!
//! Every fixture needs a local Docker daemon; tests that use them are
//! marked `#[ignore]` and run with `cargo test -- --ignored`.

pub mod error;
pub mod redis;

pub use error::{Result, TestInfraError};
