//! Control-protocol session driver
//!
//! Opens a TCP connection to the server under test and captures the
//! greeting and one response line per scripted command.

mod client;
pub mod codec;

pub use client::{run_session, Session, SessionTranscript};
