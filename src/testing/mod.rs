//! Conformance test runner
//!
//! Loads test case and expected-output files, drives the server under test
//! through a scripted session and compares the captured transcript line by
//! line against the expected one.

mod case;
mod runner;
mod verdict;

pub use case::{expected_path_for, ExpectedTranscript, TestCase, COMMAND_PREFIX, GREETING_CODE};
pub use runner::{discover, Runner, SuiteSummary, TestResult};
pub use verdict::{compare, first_mismatch, Mismatch, Verdict};
