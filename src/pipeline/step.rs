//! Step trait for pipeline execution.

use crate::error::ForgeResult;
use crate::state::RunState;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Outcome of a step's `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Proceed to the next step.
    Continue,
    /// Stop forward execution without a fatal error.
    Halt,
    /// The cancellation token fired while the step was suspended.
    Cancelled,
}

/// A Run + Cleanup unit of provisioning work.
///
/// `run` may write new `RunState` entries as side effects. Failure is fatal
/// to the pipeline; there is no retry. `cleanup` is invoked for every step
/// whose `run` was invoked, in strict reverse order, regardless of outcome,
/// and must be idempotent and best-effort: it logs its own failures and
/// never fails the run.
#[async_trait]
pub trait ProvisionStep: Send {
    async fn run(
        &mut self,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> ForgeResult<StepOutcome>;

    async fn cleanup(&mut self, state: &mut RunState);

    /// Human-readable step name for logging.
    fn name(&self) -> &str;
}

pub type BoxedStep = Box<dyn ProvisionStep>;
