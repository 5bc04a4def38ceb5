//! Supervision of local development processes.
//!
//! Starts a group of external processes, multiplexes their output into
//! labeled lines and tears the whole group down as soon as one member fails.

pub mod supervisor;

pub use cloudbuild_core::process::{LabelColor, LabeledLine, LineSink, OutputStream, ProcessSpec};
pub use supervisor::{INTERRUPTED_EXIT_CODE, Supervisor, SupervisorError, SupervisorExit};
