//! On-demand health checks.

pub use runner::{CheckOutcome, DiagnosticsReport, DiagnosticsRunner, HealthStatus};

mod runner;
