//! Pipeline execution loop.

use super::metrics::{RunMetrics, StepMetrics};
use super::step::{BoxedStep, StepOutcome};
use crate::error::{ForgeError, ForgeResult};
use crate::state::RunState;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Terminal condition of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDisposition {
    /// Every step returned `Continue`.
    Completed,
    /// A step halted forward execution.
    Halted,
    /// The external cancellation signal interrupted the run.
    Cancelled,
}

#[derive(Debug)]
pub struct RunReport {
    pub disposition: RunDisposition,
    pub metrics: RunMetrics,
}

/// Executes an ordered list of steps against a shared `RunState`.
///
/// The runner holds no domain state beyond the step list. On `Halt`, a
/// fatal step error, or cancellation it stops forward execution, then in
/// all terminal conditions unwinds `cleanup` over every started step in
/// reverse start order. A fatal step error is surfaced to the caller after
/// the unwind completes.
pub struct StepRunner {
    steps: Vec<BoxedStep>,
}

impl StepRunner {
    pub fn new(steps: Vec<BoxedStep>) -> Self {
        Self { steps }
    }

    pub async fn run(
        mut self,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> ForgeResult<RunReport> {
        let total_start = Instant::now();
        let mut step_metrics = Vec::new();
        let mut started = 0usize;
        let mut disposition = RunDisposition::Completed;
        let mut failure: Option<ForgeError> = None;

        for idx in 0..self.steps.len() {
            if cancel.is_cancelled() {
                state.mark_cancelled();
                disposition = RunDisposition::Cancelled;
                break;
            }

            started = idx + 1;
            let step = &mut self.steps[idx];
            tracing::info!(step = step.name(), "running provisioning step");

            let step_start = Instant::now();
            let outcome = step.run(state, cancel).await;
            step_metrics.push(StepMetrics {
                name: step.name().to_string(),
                duration_ms: step_start.elapsed().as_millis(),
            });

            match outcome {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Halt) => {
                    tracing::warn!(step = step.name(), "step halted the run");
                    state.mark_halted();
                    disposition = RunDisposition::Halted;
                    break;
                }
                Ok(StepOutcome::Cancelled) => {
                    tracing::info!(step = step.name(), "step interrupted by cancellation");
                    state.mark_cancelled();
                    disposition = RunDisposition::Cancelled;
                    break;
                }
                Err(e) => {
                    tracing::error!(step = step.name(), error = %e, "provisioning step failed");
                    state.mark_halted();
                    disposition = RunDisposition::Halted;
                    failure = Some(e);
                    break;
                }
            }
        }

        // Unwind in reverse start order, only over steps whose run was
        // actually invoked. Cleanup never fails the run.
        for step in self.steps[..started].iter_mut().rev() {
            tracing::debug!(step = step.name(), "running step cleanup");
            step.cleanup(state).await;
        }

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(RunReport {
            disposition,
            metrics: RunMetrics {
                total_duration_ms: total_start.elapsed().as_millis(),
                steps: step_metrics,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    enum Behavior {
        Continue,
        Halt,
        Fail,
        Cancelled,
    }

    struct RecordingStep {
        name: String,
        behavior: Behavior,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingStep {
        fn boxed(name: &str, behavior: Behavior, log: &Arc<Mutex<Vec<String>>>) -> BoxedStep {
            Box::new(Self {
                name: name.to_string(),
                behavior,
                log: Arc::clone(log),
            })
        }
    }

    #[async_trait]
    impl super::super::ProvisionStep for RecordingStep {
        async fn run(
            &mut self,
            _state: &mut RunState,
            _cancel: &CancellationToken,
        ) -> ForgeResult<StepOutcome> {
            self.log.lock().unwrap().push(format!("run:{}", self.name));
            match self.behavior {
                Behavior::Continue => Ok(StepOutcome::Continue),
                Behavior::Halt => Ok(StepOutcome::Halt),
                Behavior::Cancelled => Ok(StepOutcome::Cancelled),
                Behavior::Fail => Err(ForgeError::Environment("boom".into())),
            }
        }

        async fn cleanup(&mut self, _state: &mut RunState) {
            self.log
                .lock()
                .unwrap()
                .push(format!("cleanup:{}", self.name));
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn all_steps_continue_and_cleanup_unwinds_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = StepRunner::new(vec![
            RecordingStep::boxed("a", Behavior::Continue, &log),
            RecordingStep::boxed("b", Behavior::Continue, &log),
        ]);

        let mut state = RunState::new();
        let report = runner
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.disposition, RunDisposition::Completed);
        assert!(!state.halted());
        assert!(!state.cancelled());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["run:a", "run:b", "cleanup:b", "cleanup:a"]
        );
        assert!(report.metrics.step_duration_ms("a").is_some());
    }

    #[tokio::test]
    async fn halt_stops_forward_execution_and_unwinds_started_steps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = StepRunner::new(vec![
            RecordingStep::boxed("a", Behavior::Continue, &log),
            RecordingStep::boxed("b", Behavior::Halt, &log),
            RecordingStep::boxed("c", Behavior::Continue, &log),
        ]);

        let mut state = RunState::new();
        let report = runner
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.disposition, RunDisposition::Halted);
        assert!(state.halted());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["run:a", "run:b", "cleanup:b", "cleanup:a"]
        );
    }

    #[tokio::test]
    async fn step_failure_is_surfaced_after_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = StepRunner::new(vec![
            RecordingStep::boxed("a", Behavior::Continue, &log),
            RecordingStep::boxed("b", Behavior::Fail, &log),
        ]);

        let mut state = RunState::new();
        let err = runner
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::Environment(_)));
        assert!(state.halted());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["run:a", "run:b", "cleanup:b", "cleanup:a"]
        );
    }

    #[tokio::test]
    async fn pre_cancelled_token_runs_no_steps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = StepRunner::new(vec![RecordingStep::boxed("a", Behavior::Continue, &log)]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut state = RunState::new();
        let report = runner.run(&mut state, &cancel).await.unwrap();

        assert_eq!(report.disposition, RunDisposition::Cancelled);
        assert!(state.cancelled());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_outcome_records_state_and_unwinds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = StepRunner::new(vec![
            RecordingStep::boxed("a", Behavior::Cancelled, &log),
            RecordingStep::boxed("b", Behavior::Continue, &log),
        ]);

        let mut state = RunState::new();
        let report = runner
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.disposition, RunDisposition::Cancelled);
        assert!(state.cancelled());
        assert_eq!(*log.lock().unwrap(), vec!["run:a", "cleanup:a"]);
    }
}
