//! Step: emulated TPM device.
//!
//! Launches `swtpm` as a supervised subprocess bound to a unix socket in a
//! private temp directory; the hypervisor is pointed at the socket by the
//! command-line construction outside this crate. The emulator's on-disk
//! state is generated fresh each run and must never leak past it, so
//! cleanup kills the process and removes the directory regardless of run
//! outcome.

use crate::error::{ForgeError, ForgeResult};
use crate::pipeline::{ProvisionStep, StepOutcome};
use crate::state::RunState;
use crate::util::find_binary;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Child, Command};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A running TPM emulator: subprocess handle, control socket path, and the
/// temp directory holding its state. Owned by [`CreateVtpmStep`]; nothing
/// else touches the process.
pub struct TpmEmulator {
    pub child: Child,
    pub socket_path: PathBuf,
    pub state_dir: TempDir,
}

pub struct CreateVtpmStep {
    enabled: bool,
    use_tpm1: bool,
}

impl CreateVtpmStep {
    pub fn new(enabled: bool, use_tpm1: bool) -> Self {
        Self { enabled, use_tpm1 }
    }
}

#[async_trait]
impl ProvisionStep for CreateVtpmStep {
    async fn run(
        &mut self,
        state: &mut RunState,
        _cancel: &CancellationToken,
    ) -> ForgeResult<StepOutcome> {
        if !self.enabled {
            return Ok(StepOutcome::Continue);
        }

        // Check the platform before acquiring any resources.
        if cfg!(windows) {
            return Err(ForgeError::Environment(
                "TPM emulation is only supported on unix-like hosts".to_string(),
            ));
        }

        let swtpm = find_binary("swtpm").ok_or_else(|| {
            ForgeError::Environment(
                "failed to locate swtpm on PATH, it is required for TPM emulation".to_string(),
            )
        })?;

        let state_dir = tempfile::tempdir().map_err(|e| {
            ForgeError::Environment(format!("failed to create TPM state directory: {e}"))
        })?;
        let socket_path = state_dir.path().join("vtpm.sock");

        let mut command = Command::new(&swtpm);
        command
            .arg("socket")
            .arg("--tpmstate")
            .arg(format!("dir={}", state_dir.path().display()))
            .arg("--ctrl")
            .arg(format!("type=unixio,path={}", socket_path.display()));
        if !self.use_tpm1 {
            command.arg("--tpm2");
        }

        tracing::debug!(binary = %swtpm.display(), ?command, "launching TPM emulator");
        let mut child = command
            .spawn()
            .map_err(|e| ForgeError::Environment(format!("failed to start swtpm: {e}")))?;

        // Readiness is implicit: confirm the process survived startup.
        if let Some(status) = child.try_wait()? {
            return Err(ForgeError::Environment(format!(
                "swtpm exited immediately with {status}"
            )));
        }

        tracing::info!(
            pid = child.id(),
            socket = %socket_path.display(),
            "TPM emulator running"
        );

        state.set_tpm(TpmEmulator {
            child,
            socket_path,
            state_dir,
        });

        Ok(StepOutcome::Continue)
    }

    async fn cleanup(&mut self, state: &mut RunState) {
        let Some(mut tpm) = state.take_tpm() else {
            return;
        };

        tracing::debug!(pid = tpm.child.id(), "killing TPM emulator");
        if let Err(e) = tpm.child.kill() {
            tracing::warn!(error = %e, "failed to kill TPM emulator");
        }
        let _ = tpm.child.wait();

        if let Err(e) = tpm.state_dir.close() {
            tracing::warn!(error = %e, "failed to remove TPM state directory");
        }
    }

    fn name(&self) -> &str {
        "create_vtpm"
    }
}
