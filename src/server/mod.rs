//! Server-under-test process management
//!
//! Spawning, transport-level readiness detection and cleanup of the FTP
//! daemon being tested.

mod process;
pub mod readiness;
pub mod sweep;

pub use process::{ProcessManager, ServerHandle, ServerState};
pub use sweep::SweepOutcome;
