//! Shared run state carried through the provisioning pipeline.
//!
//! `RunState` replaces an untyped key/value bag with a typed context struct.
//! Each field is written once by the step that owns it and read through an
//! accessor. Required-read accessors fail fast with
//! [`ForgeError::Internal`] when the producing step has not run yet: that is
//! a pipeline-ordering bug, not a runtime condition, so it is never retried.

use crate::error::{ForgeError, ForgeResult};
use crate::steps::vtpm::TpmEmulator;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct RunState {
    http_ip: Option<String>,
    http_port: Option<u16>,
    vnc_port: Option<u16>,
    vnc_password: Option<String>,
    ssh_public_key: Option<String>,
    tpm: Option<TpmEmulator>,
    efivars_path: Option<PathBuf>,
    cancelled: bool,
    halted: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn required<T: Copy>(value: Option<T>, key: &str) -> ForgeResult<T> {
        value.ok_or_else(|| {
            ForgeError::Internal(format!(
                "{key} was read before its producing step ran, this is a pipeline ordering bug"
            ))
        })
    }

    /// Address of the seed-file HTTP server, as reachable from the guest.
    pub fn http_ip(&self) -> ForgeResult<&str> {
        Self::required(self.http_ip.as_deref(), "http_ip")
    }

    pub fn set_http_ip(&mut self, ip: impl Into<String>) {
        self.http_ip = Some(ip.into());
    }

    /// Bound port of the seed-file HTTP server.
    pub fn http_port(&self) -> ForgeResult<u16> {
        Self::required(self.http_port, "http_port")
    }

    pub fn set_http_port(&mut self, port: u16) {
        self.http_port = Some(port);
    }

    /// Port the hypervisor exposes its VNC console on.
    pub fn vnc_port(&self) -> ForgeResult<u16> {
        Self::required(self.vnc_port, "vnc_port")
    }

    pub fn set_vnc_port(&mut self, port: u16) {
        self.vnc_port = Some(port);
    }

    pub fn vnc_password(&self) -> Option<&str> {
        self.vnc_password.as_deref()
    }

    pub fn set_vnc_password(&mut self, password: impl Into<String>) {
        self.vnc_password = Some(password.into());
    }

    pub fn ssh_public_key(&self) -> Option<&str> {
        self.ssh_public_key.as_deref()
    }

    pub fn set_ssh_public_key(&mut self, key: impl Into<String>) {
        self.ssh_public_key = Some(key.into());
    }

    /// Running TPM emulator record, owned by the vTPM step.
    pub fn set_tpm(&mut self, tpm: TpmEmulator) {
        self.tpm = Some(tpm);
    }

    pub fn tpm(&self) -> Option<&TpmEmulator> {
        self.tpm.as_ref()
    }

    pub fn take_tpm(&mut self) -> Option<TpmEmulator> {
        self.tpm.take()
    }

    /// Staged firmware-variables file inside the output directory.
    pub fn efivars_path(&self) -> Option<&Path> {
        self.efivars_path.as_deref()
    }

    pub fn set_efivars_path(&mut self, path: PathBuf) {
        self.efivars_path = Some(path);
    }

    /// Set by the orchestrator when the run was interrupted by cancellation.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Set by the orchestrator when a step halted the run or failed.
    pub fn halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn mark_halted(&mut self) {
        self.halted = true;
    }
}
