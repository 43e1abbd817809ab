//! FTP conformance harness - black-box testing for FTP daemons
//!
//! This library launches a server under test, drives its control protocol
//! with scripted commands and compares the captured transcript against a
//! recorded expectation.

pub mod cli;
pub mod commands;
pub mod common;
pub mod server;
pub mod session;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, HarnessConfig, Result};
pub use testing::{Runner, Verdict};
