//! Process-level plumbing for the `coinlink` binary.
//!
//! - [`sig_down`] - cancellation on SIGTERM/SIGINT
//! - [`telemetry`] - log output and optional OTLP export

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
