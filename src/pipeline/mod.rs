//! Sequential step orchestration for provisioning runs.
//!
//! ## Architecture
//!
//! ```text
//! StepRunner → [ProvisionStep, ProvisionStep, ...]
//!
//! - ProvisionStep: a Run + Cleanup unit of provisioning work
//! - StepRunner:    executes steps in order, unwinds cleanup in reverse
//! ```
//!
//! Steps run strictly one after another on a single logical pipeline; a
//! step's `run` blocks on its own I/O and observes the cancellation token at
//! every suspension point. In every terminal condition (completed, halted,
//! failed, cancelled) the runner invokes `cleanup` on each started step in
//! reverse start order, exactly once, best-effort.

mod metrics;
mod runner;
mod step;

pub use metrics::{RunMetrics, StepMetrics};
pub use runner::{RunDisposition, RunReport, StepRunner};
pub use step::{BoxedStep, ProvisionStep, StepOutcome};
