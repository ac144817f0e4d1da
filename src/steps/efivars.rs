//! Step: stage UEFI firmware variables.
//!
//! Copies the immutable VARS template into the output directory, where it
//! becomes the hypervisor's mutable runtime firmware state. On success the
//! copy is deliberately retained as part of the produced artifact; it is
//! removed only when the run was cancelled or halted.

use crate::error::{ForgeError, ForgeResult};
use crate::pipeline::{ProvisionStep, StepOutcome};
use crate::state::RunState;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub const EFIVARS_FILE_NAME: &str = "efivars.fd";

pub struct PrepareEfivarsStep {
    enabled: bool,
    output_dir: PathBuf,
    source_path: PathBuf,
}

impl PrepareEfivarsStep {
    pub fn new(enabled: bool, output_dir: PathBuf, source_path: PathBuf) -> Self {
        Self {
            enabled,
            output_dir,
            source_path,
        }
    }
}

#[async_trait]
impl ProvisionStep for PrepareEfivarsStep {
    async fn run(
        &mut self,
        state: &mut RunState,
        _cancel: &CancellationToken,
    ) -> ForgeResult<StepOutcome> {
        if !self.enabled {
            return Ok(StepOutcome::Continue);
        }

        let dst_path = self.output_dir.join(EFIVARS_FILE_NAME);
        let mut dst = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dst_path)
            .map_err(|e| {
                ForgeError::Environment(format!(
                    "failed to create firmware vars file at {}: {e}",
                    dst_path.display()
                ))
            })?;

        // Recorded before the copy so a failed copy still gets cleaned up.
        state.set_efivars_path(dst_path.clone());

        let mut src = File::open(&self.source_path).map_err(|e| {
            ForgeError::Environment(format!(
                "failed to read firmware vars file at {}: {e}",
                self.source_path.display()
            ))
        })?;

        let bytes = std::io::copy(&mut src, &mut dst)
            .map_err(|e| ForgeError::Environment(format!("failed to copy firmware vars: {e}")))?;
        tracing::info!(bytes, dst = %dst_path.display(), "staged firmware vars");

        Ok(StepOutcome::Continue)
    }

    async fn cleanup(&mut self, state: &mut RunState) {
        if !self.enabled {
            return;
        }
        // On a successful run the staged file is part of the artifact.
        if !(state.cancelled() || state.halted()) {
            return;
        }
        let Some(path) = state.efivars_path() else {
            return;
        };

        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staged firmware vars");
        } else {
            tracing::debug!(path = %path.display(), "removed staged firmware vars");
        }
    }

    fn name(&self) -> &str {
        "prepare_efivars"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("output");
        std::fs::create_dir(&output_dir).unwrap();
        let source = dir.path().join("OVMF_VARS.fd");
        std::fs::write(&source, b"firmware variable template").unwrap();
        (dir, output_dir, source)
    }

    #[tokio::test]
    async fn stages_the_vars_file_and_records_the_path() {
        let (_dir, output_dir, source) = fixture();
        let mut step = PrepareEfivarsStep::new(true, output_dir.clone(), source);
        let mut state = RunState::new();

        let outcome = step
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Continue);
        let staged = output_dir.join(EFIVARS_FILE_NAME);
        assert_eq!(state.efivars_path(), Some(staged.as_path()));
        assert_eq!(
            std::fs::read(&staged).unwrap(),
            b"firmware variable template"
        );
    }

    #[tokio::test]
    async fn successful_run_retains_the_staged_file() {
        let (_dir, output_dir, source) = fixture();
        let mut step = PrepareEfivarsStep::new(true, output_dir.clone(), source);
        let mut state = RunState::new();

        step.run(&mut state, &CancellationToken::new())
            .await
            .unwrap();
        step.cleanup(&mut state).await;

        assert!(output_dir.join(EFIVARS_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn unreadable_source_halts_after_recording_destination() {
        let (_dir, output_dir, _source) = fixture();
        let missing = output_dir.join("no-such-vars.fd");
        let mut step = PrepareEfivarsStep::new(true, output_dir.clone(), missing);
        let mut state = RunState::new();

        let err = step
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Environment(_)));

        // Destination was recorded before the copy attempt, so a
        // halt-driven cleanup removes the empty partial file.
        let staged = output_dir.join(EFIVARS_FILE_NAME);
        assert!(state.efivars_path().is_some());
        assert!(staged.exists());

        state.mark_halted();
        step.cleanup(&mut state).await;
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn disabled_step_stages_nothing() {
        let (_dir, output_dir, source) = fixture();
        let mut step = PrepareEfivarsStep::new(false, output_dir.clone(), source);
        let mut state = RunState::new();

        let outcome = step
            .run(&mut state, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Continue);
        assert!(state.efivars_path().is_none());
        assert!(!output_dir.join(EFIVARS_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn cancelled_run_removes_the_staged_file() {
        let (_dir, output_dir, source) = fixture();
        let mut step = PrepareEfivarsStep::new(true, output_dir.clone(), source);
        let mut state = RunState::new();

        step.run(&mut state, &CancellationToken::new())
            .await
            .unwrap();
        state.mark_cancelled();
        step.cleanup(&mut state).await;

        assert!(!output_dir.join(EFIVARS_FILE_NAME).exists());
    }
}
