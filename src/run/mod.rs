//! Run orchestration: the worker pool, cancellation and the final report.

pub mod cancellation;
pub mod controller;
pub mod report;

pub use cancellation::{CancellationToken, RunGuard};
pub use controller::RunController;
pub use report::{RunReport, SeedReport};
