//! Build configuration and its derivation.
//!
//! `Config::prepare` is a pure, deterministic transform applied once before
//! the pipeline runs: it fills defaults, probes the host for a usable
//! accelerator, resolves the CPU topology, and validates cross-field
//! constraints. All violations accumulate into a single aggregated
//! [`ForgeError::Config`] so the user can fix every problem in one edit
//! cycle; non-fatal findings are returned as warnings.

mod efi;
mod smp;

pub use efi::EfiBootConfig;
pub use smp::SmpConfig;

use crate::bootcmd::BootStep;
use crate::error::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const ACCELERATORS: &[&str] = &["none", "kvm", "tcg", "xen", "hax", "hvf", "whpx"];
const DISK_INTERFACES: &[&str] = &["ide", "sata", "scsi", "virtio", "virtio-scsi"];
const DISK_CACHES: &[&str] = &["writethrough", "writeback", "none", "unsafe", "directsync"];
const DISK_DISCARDS: &[&str] = &["unmap", "ignore"];
const DISK_DETECT_ZEROES: &[&str] = &["unmap", "on", "off"];

pub const DEFAULT_DISK_SIZE: &str = "40960M";
pub const DEFAULT_MEMORY_MIB: u32 = 512;
pub const DEFAULT_BOOT_WAIT: Duration = Duration::from_secs(10);

/// VNC display numbering starts at TCP port 5900; QEMU parses the `-vnc`
/// display argument relative to that floor.
pub const VNC_PORT_FLOOR: u16 = 5900;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub smp: SmpConfig,
    #[serde(flatten)]
    pub efi: EfiBootConfig,

    /// Accelerator backend. Probed from the host when unset: `kvm` when
    /// `/dev/kvm` is usable, `tcg` otherwise.
    pub accelerator: String,
    /// Primary disk size, digits with an optional `b/k/m/g/t` suffix.
    /// Digits-only values default to megabytes.
    pub disk_size: String,
    pub skip_resize_disk: bool,
    pub disk_cache: String,
    pub disk_discard: String,
    pub disk_detect_zeroes: String,
    pub skip_compaction: bool,
    pub disk_compression: bool,
    /// Output image format, `qcow2` or `raw`.
    pub format: String,
    /// Treat the source as a bootable disk image instead of an installer
    /// ISO.
    pub disk_image: bool,
    /// Back the work disk with the source image instead of cloning it.
    /// Requires `disk_image` and the `qcow2` format.
    pub use_backing_file: bool,
    pub machine_type: String,
    /// Guest memory in megabytes.
    pub memory: u32,
    pub net_device: String,
    /// Attach the guest NIC to an existing bridge instead of user-mode
    /// networking. Linux hosts only; implies the management socket.
    pub net_bridge: Option<String>,
    pub output_dir: PathBuf,
    pub qemu_binary: String,
    /// Expose the hypervisor's management (QMP) socket.
    pub qmp_enable: bool,
    pub qmp_socket_path: Option<PathBuf>,
    pub vnc_bind_address: String,
    /// Protect the VNC console with a password; implies the management
    /// socket, which is how the password is installed.
    pub vnc_use_password: bool,
    pub vnc_port_min: u16,
    pub vnc_port_max: u16,
    pub vm_name: String,
    pub disk_interface: String,
    pub cdrom_interface: String,

    /// Expose an emulated TPM device to the guest.
    pub vtpm: bool,
    /// Use TPM specification 1.2 instead of the 2.0 default.
    pub use_tpm1: bool,
    pub tpm_device_type: String,

    /// Delay before the first console connection attempt.
    pub boot_wait: Option<Duration>,
    /// Pause between injected key events.
    pub boot_key_interval: Option<Duration>,
    /// Disable console automation entirely.
    pub disable_vnc: bool,
    /// Flat boot command; when non-empty it overrides `boot_steps` as a
    /// single unlabelled script entry.
    pub boot_command: Vec<String>,
    /// Labelled boot script entries.
    pub boot_steps: Vec<BootStep>,
}

impl Config {
    /// Fill defaults and validate. Returns accumulated warnings on
    /// success; on failure every violation is listed in one error.
    pub fn prepare(&mut self, build_name: &str) -> ForgeResult<Vec<String>> {
        let mut errs: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        match normalize_disk_size(&self.disk_size) {
            Ok(size) => self.disk_size = size,
            Err(e) => errs.push(e),
        }

        if self.disk_cache.is_empty() {
            self.disk_cache = "writeback".to_string();
        }
        if self.disk_discard.is_empty() {
            self.disk_discard = "ignore".to_string();
        }
        if self.disk_detect_zeroes.is_empty() {
            self.disk_detect_zeroes = "off".to_string();
        }

        if self.accelerator.is_empty() {
            self.accelerator = detect_accelerator().to_string();
            tracing::debug!(accelerator = %self.accelerator, "using detected accelerator");
        } else {
            tracing::debug!(accelerator = %self.accelerator, "using specified accelerator");
        }

        if self.machine_type.is_empty() {
            self.machine_type = "pc".to_string();
        }
        if self.output_dir.as_os_str().is_empty() {
            self.output_dir = PathBuf::from(format!("output-{build_name}"));
        }
        if self.qemu_binary.is_empty() {
            self.qemu_binary = "qemu-system-x86_64".to_string();
        }

        if self.memory < 10 {
            warnings.push(format!(
                "memory size {}M is too small, using default: {}M",
                self.memory, DEFAULT_MEMORY_MIB
            ));
            self.memory = DEFAULT_MEMORY_MIB;
        }

        if self.vnc_bind_address.is_empty() {
            self.vnc_bind_address = "127.0.0.1".to_string();
        }
        if self.vnc_port_min == 0 {
            self.vnc_port_min = VNC_PORT_FLOOR;
        }
        if self.vnc_port_max == 0 {
            self.vnc_port_max = 6000;
        }

        if self.vm_name.is_empty() {
            self.vm_name = format!("vmforge-{build_name}");
        }
        if self.format.is_empty() {
            self.format = "qcow2".to_string();
        }
        if self.tpm_device_type.is_empty() {
            self.tpm_device_type = "tpm-tis".to_string();
        }
        if self.net_device.is_empty() {
            self.net_device = "virtio-net".to_string();
        }
        if self.disk_interface.is_empty() {
            self.disk_interface = "virtio".to_string();
        }
        if self.cdrom_interface.is_empty() {
            self.cdrom_interface = "virtio".to_string();
        }
        if self.boot_wait.is_none() {
            self.boot_wait = Some(DEFAULT_BOOT_WAIT);
        }

        self.efi.load_defaults();

        if !(self.format == "qcow2" || self.format == "raw") {
            errs.push("invalid format, only 'qcow2' or 'raw' are allowed".to_string());
        }
        if self.format != "qcow2" {
            self.skip_compaction = true;
            self.disk_compression = false;
        }

        if self.use_backing_file {
            self.skip_compaction = true;
            if !(self.disk_image && self.format == "qcow2") {
                errs.push(
                    "use_backing_file can only be enabled for qcow2 images and when disk_image \
                     is true"
                        .to_string(),
                );
            }
        }
        if self.skip_resize_disk && !self.disk_image {
            errs.push("skip_resize_disk can only be used when disk_image is true".to_string());
        }

        if !ACCELERATORS.contains(&self.accelerator.as_str()) {
            errs.push(format!(
                "invalid accelerator '{}', only 'kvm', 'tcg', 'xen', 'hax', 'hvf', 'whpx', or \
                 'none' are allowed",
                self.accelerator
            ));
        }
        if !DISK_INTERFACES.contains(&self.disk_interface.as_str()) {
            errs.push(format!(
                "unrecognized disk interface type '{}'",
                self.disk_interface
            ));
        }
        if !DISK_CACHES.contains(&self.disk_cache.as_str()) {
            errs.push(format!("unrecognized disk cache type '{}'", self.disk_cache));
        }
        if !DISK_DISCARDS.contains(&self.disk_discard.as_str()) {
            errs.push(format!(
                "unrecognized disk discard type '{}'",
                self.disk_discard
            ));
        }
        if !DISK_DETECT_ZEROES.contains(&self.disk_detect_zeroes.as_str()) {
            errs.push(format!(
                "unrecognized disk detect zeroes setting '{}'",
                self.disk_detect_zeroes
            ));
        }

        if self.vnc_port_min < VNC_PORT_FLOOR {
            errs.push(format!("vnc_port_min cannot be below {VNC_PORT_FLOOR}"));
        }
        if self.vnc_port_min > self.vnc_port_max {
            errs.push("vnc_port_min must be less than vnc_port_max".to_string());
        }

        if self.net_bridge.is_some() && !cfg!(target_os = "linux") {
            errs.push("net_bridge is only supported on Linux based hosts".to_string());
        }

        // Both features are driven through the management socket, so force
        // it on when either is requested.
        if self.net_bridge.is_some() || self.vnc_use_password {
            self.qmp_enable = true;
        }
        if self.qmp_enable && self.qmp_socket_path.is_none() {
            self.qmp_socket_path = Some(
                self.output_dir
                    .join(format!("{}.monitor", self.vm_name)),
            );
        }

        if !errs.is_empty() {
            return Err(ForgeError::Config(format!(
                "{} configuration error(s):\n  - {}",
                errs.len(),
                errs.join("\n  - ")
            )));
        }
        Ok(warnings)
    }

    /// The boot command script to type at the console.
    pub fn boot_script(&self) -> Vec<BootStep> {
        let flat = self.boot_command.concat();
        if !flat.is_empty() {
            return vec![BootStep {
                command: flat,
                description: None,
            }];
        }
        self.boot_steps.clone()
    }
}

fn normalize_disk_size(raw: &str) -> Result<String, String> {
    if raw.is_empty() || raw == "0" {
        return Ok(DEFAULT_DISK_SIZE.to_string());
    }

    let digits_end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, suffix) = raw.split_at(digits_end);
    if digits.is_empty() {
        return Err(format!("invalid disk size '{raw}'"));
    }

    let mut chars = suffix.chars();
    match (chars.next(), chars.next()) {
        // Digits only: default to megabytes.
        (None, _) => Ok(format!("{raw}M")),
        (Some(unit), None) if "bkmgt".contains(unit.to_ascii_lowercase()) => Ok(raw.to_string()),
        _ => Err(format!("invalid disk size '{raw}'")),
    }
}

fn detect_accelerator() -> &'static str {
    if cfg!(windows) {
        return "tcg";
    }
    // /dev/kvm only exists when the kvm module is loaded and the host
    // supports virtualization extensions; opening it proves it is usable.
    match std::fs::File::open("/dev/kvm") {
        Ok(_) => "kvm",
        Err(_) => "tcg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(mutate: impl FnOnce(&mut Config)) -> ForgeResult<(Config, Vec<String>)> {
        let mut config = Config::default();
        mutate(&mut config);
        let warnings = config.prepare("test")?;
        Ok((config, warnings))
    }

    #[test]
    fn defaults_are_applied() {
        let (config, _) = prepared(|_| {}).unwrap();
        assert_eq!(config.disk_size, DEFAULT_DISK_SIZE);
        assert_eq!(config.disk_cache, "writeback");
        assert_eq!(config.disk_discard, "ignore");
        assert_eq!(config.disk_detect_zeroes, "off");
        assert_eq!(config.format, "qcow2");
        assert_eq!(config.machine_type, "pc");
        assert_eq!(config.qemu_binary, "qemu-system-x86_64");
        assert_eq!(config.memory, DEFAULT_MEMORY_MIB);
        assert_eq!(config.vnc_bind_address, "127.0.0.1");
        assert_eq!(config.vnc_port_min, 5900);
        assert_eq!(config.vnc_port_max, 6000);
        assert_eq!(config.vm_name, "vmforge-test");
        assert_eq!(config.output_dir, PathBuf::from("output-test"));
        assert_eq!(config.tpm_device_type, "tpm-tis");
        assert_eq!(config.boot_wait, Some(DEFAULT_BOOT_WAIT));
        assert!(["kvm", "tcg"].contains(&config.accelerator.as_str()));
    }

    #[test]
    fn disk_size_normalization() {
        let (config, _) = prepared(|c| c.disk_size = "100".to_string()).unwrap();
        assert_eq!(config.disk_size, "100M");

        let (config, _) = prepared(|c| c.disk_size = "100G".to_string()).unwrap();
        assert_eq!(config.disk_size, "100G");

        let (config, _) = prepared(|c| c.disk_size = "0".to_string()).unwrap();
        assert_eq!(config.disk_size, DEFAULT_DISK_SIZE);

        assert!(prepared(|c| c.disk_size = "100X".to_string()).is_err());
        assert!(prepared(|c| c.disk_size = "12M34".to_string()).is_err());
    }

    #[test]
    fn vnc_port_range_validation() {
        let (config, _) = prepared(|c| {
            c.vnc_port_min = 5900;
            c.vnc_port_max = 5900;
        })
        .unwrap();
        assert_eq!(config.vnc_port_min, config.vnc_port_max);

        assert!(
            prepared(|c| {
                c.vnc_port_min = 5800;
                c.vnc_port_max = 6000;
            })
            .is_err()
        );
        assert!(
            prepared(|c| {
                c.vnc_port_min = 6000;
                c.vnc_port_max = 5900;
            })
            .is_err()
        );
    }

    #[test]
    fn vnc_password_implies_management_socket() {
        let (config, _) = prepared(|c| c.vnc_use_password = true).unwrap();
        assert!(config.qmp_enable);
        assert_eq!(
            config.qmp_socket_path,
            Some(PathBuf::from("output-test/vmforge-test.monitor"))
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn net_bridge_implies_management_socket() {
        let (config, _) = prepared(|c| c.net_bridge = Some("virbr0".to_string())).unwrap();
        assert!(config.qmp_enable);
        assert!(config.qmp_socket_path.is_some());
    }

    #[test]
    fn explicit_socket_path_is_preserved() {
        let (config, _) = prepared(|c| {
            c.qmp_enable = true;
            c.qmp_socket_path = Some(PathBuf::from("/tmp/forge.monitor"));
        })
        .unwrap();
        assert_eq!(
            config.qmp_socket_path,
            Some(PathBuf::from("/tmp/forge.monitor"))
        );
    }

    #[test]
    fn format_restrictions() {
        assert!(prepared(|c| c.format = "vmdk".to_string()).is_err());

        let (config, _) = prepared(|c| {
            c.format = "raw".to_string();
            c.disk_compression = true;
        })
        .unwrap();
        assert!(config.skip_compaction);
        assert!(!config.disk_compression);
    }

    #[test]
    fn backing_file_requires_qcow2_disk_image() {
        assert!(prepared(|c| c.use_backing_file = true).is_err());

        let (config, _) = prepared(|c| {
            c.use_backing_file = true;
            c.disk_image = true;
        })
        .unwrap();
        assert!(config.skip_compaction);
    }

    #[test]
    fn skip_resize_requires_disk_image() {
        assert!(prepared(|c| c.skip_resize_disk = true).is_err());
        assert!(
            prepared(|c| {
                c.skip_resize_disk = true;
                c.disk_image = true;
            })
            .is_ok()
        );
    }

    #[test]
    fn violations_are_aggregated_into_one_error() {
        let err = prepared(|c| {
            c.format = "vmdk".to_string();
            c.disk_cache = "bogus".to_string();
            c.vnc_port_min = 5000;
        })
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("invalid format"));
        assert!(message.contains("unrecognized disk cache type"));
        assert!(message.contains("vnc_port_min"));
    }

    #[test]
    fn small_memory_floors_with_warning() {
        let (config, warnings) = prepared(|c| c.memory = 4).unwrap();
        assert_eq!(config.memory, DEFAULT_MEMORY_MIB);
        assert!(warnings.iter().any(|w| w.contains("too small")));
    }

    #[test]
    fn flat_boot_command_overrides_boot_steps() {
        let mut config = Config {
            boot_command: vec!["root".to_string(), "<enter>".to_string()],
            boot_steps: vec![BootStep {
                command: "ignored".to_string(),
                description: Some("never typed".to_string()),
            }],
            ..Default::default()
        };
        config.prepare("test").unwrap();

        let script = config.boot_script();
        assert_eq!(script.len(), 1);
        assert_eq!(script[0].command, "root<enter>");
        assert!(script[0].description.is_none());
    }
}
