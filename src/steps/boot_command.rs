//! Step: type the boot command into the VM over VNC.
//!
//! Console typing is a one-shot, strictly-ordered side effect against the
//! guest's keyboard buffer. There is no safe way to resume a partial
//! failure, so every error on this path is fatal and halts the run instead
//! of being skipped: a missing console service indicates a deeper
//! provisioning failure, and a mid-sequence transport error leaves the
//! remote keyboard state indeterminate.

use crate::bootcmd::{self, BootStep, ReplayOutcome};
use crate::config::{Config, DEFAULT_BOOT_WAIT};
use crate::error::{ForgeError, ForgeResult};
use crate::pipeline::{ProvisionStep, StepOutcome};
use crate::state::RunState;
use crate::template::{BootTemplateData, TemplateRenderer};
use crate::vnc::{VncClient, VncDriver};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Debug hook invoked after each typed script entry with a human-readable
/// description of what was just typed.
pub type PauseFn = Box<dyn Fn(&str) + Send + Sync>;

pub struct TypeBootCommandStep {
    disable_vnc: bool,
    boot_wait: Duration,
    key_interval: Option<Duration>,
    vnc_host: String,
    vm_name: String,
    script: Vec<BootStep>,
    renderer: Arc<dyn TemplateRenderer>,
    pause: Option<PauseFn>,
}

impl TypeBootCommandStep {
    pub fn from_config(config: &Config, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            disable_vnc: config.disable_vnc,
            boot_wait: config.boot_wait.unwrap_or(DEFAULT_BOOT_WAIT),
            key_interval: config.boot_key_interval,
            vnc_host: config.vnc_bind_address.clone(),
            vm_name: config.vm_name.clone(),
            script: config.boot_script(),
            renderer,
            pause: None,
        }
    }

    /// Enable step-through debugging.
    pub fn with_pause(mut self, pause: PauseFn) -> Self {
        self.pause = Some(pause);
        self
    }
}

#[async_trait]
impl ProvisionStep for TypeBootCommandStep {
    async fn run(
        &mut self,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> ForgeResult<StepOutcome> {
        if self.disable_vnc {
            tracing::debug!("console automation disabled, skipping boot command step");
            return Ok(StepOutcome::Continue);
        }

        if !self.boot_wait.is_zero() {
            tracing::info!(wait = ?self.boot_wait, "waiting for the VM to boot");
            tokio::select! {
                _ = cancel.cancelled() => return Ok(StepOutcome::Cancelled),
                _ = tokio::time::sleep(self.boot_wait) => {}
            }
        }

        let vnc_port = state.vnc_port()?;
        tracing::info!(
            host = %self.vnc_host,
            port = vnc_port,
            "connecting to the VM console over VNC"
        );

        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(StepOutcome::Cancelled),
            result = TcpStream::connect((self.vnc_host.as_str(), vnc_port)) => {
                result.map_err(|e| {
                    ForgeError::Protocol(format!(
                        "connecting to VNC at {}:{vnc_port}: {e}",
                        self.vnc_host
                    ))
                })?
            }
        };

        let password = state.vnc_password().map(str::to_owned);
        let handshake = VncClient::handshake(stream, password.as_deref());
        let client = match cancel.run_until_cancelled(handshake).await {
            None => return Ok(StepOutcome::Cancelled),
            Some(result) => result?,
        };
        tracing::info!(desktop = client.desktop_name(), "connected to VNC desktop");

        let data = BootTemplateData {
            http_ip: state.http_ip()?.to_string(),
            http_port: state.http_port()?,
            name: self.vm_name.clone(),
            ssh_public_key: state.ssh_public_key().unwrap_or_default().to_string(),
        };

        let mut driver = VncDriver::new(client, self.key_interval, cancel.clone());
        tracing::info!("typing the boot commands over VNC");

        for entry in &self.script {
            if entry.command.is_empty() {
                continue;
            }

            if let Some(description) = &entry.description {
                tracing::info!(%description, "typing boot command");
            }

            let command = self.renderer.render(&entry.command, &data)?;
            let sequence = bootcmd::parse(&command)?;

            match sequence.replay(&mut driver, cancel).await? {
                ReplayOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
                ReplayOutcome::Completed => {}
            }

            if let Some(pause) = &self.pause {
                let message = match &entry.description {
                    Some(description) => {
                        format!("boot description: \"{description}\", command: {command}")
                    }
                    None => format!("boot command: {command}"),
                };
                pause(&message);
            }
        }

        Ok(StepOutcome::Continue)
    }

    async fn cleanup(&mut self, _state: &mut RunState) {}

    fn name(&self) -> &str {
        "type_boot_command"
    }
}
