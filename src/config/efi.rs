//! UEFI boot configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_OVMF_CODE: &str = "/usr/share/OVMF/OVMF_CODE.fd";
const DEFAULT_OVMF_VARS: &str = "/usr/share/OVMF/OVMF_VARS.fd";

/// Options for booting the guest on UEFI firmware instead of BIOS.
///
/// The firmware is split into an immutable CODE part and a VARS file that
/// persists UEFI state between boot cycles; the VARS file is staged into
/// the output directory so the hypervisor can write to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EfiBootConfig {
    /// Boot in EFI mode. Implicitly enabled when either firmware path is
    /// set.
    pub efi_boot: bool,
    /// Path to the CODE part of OVMF or a compatible firmware.
    pub efi_firmware_code: Option<PathBuf>,
    /// Path to the VARS file corresponding to the firmware code.
    pub efi_firmware_vars: Option<PathBuf>,
}

impl EfiBootConfig {
    pub(crate) fn load_defaults(&mut self) {
        if self.efi_firmware_code.is_some() || self.efi_firmware_vars.is_some() {
            self.efi_boot = true;
        }

        if !self.efi_boot {
            return;
        }

        if self.efi_firmware_code.is_none() {
            self.efi_firmware_code = Some(PathBuf::from(DEFAULT_OVMF_CODE));
        }
        if self.efi_firmware_vars.is_none() {
            self.efi_firmware_vars = Some(PathBuf::from(DEFAULT_OVMF_VARS));
        }
    }
}
