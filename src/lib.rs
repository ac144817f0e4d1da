//! vmforge — provisions a VM image by driving an external hypervisor
//! through an ordered, interruptible sequence of provisioning steps,
//! culminating in automated keystroke injection over VNC to drive an
//! unattended OS installer.
//!
//! ## Architecture
//!
//! ```text
//! Config::prepare ──► StepRunner ──► [CreateVtpmStep]
//!                          │         [PrepareEfivarsStep]
//!                          │         [TypeBootCommandStep] ──► VncClient
//!                          │                │
//!                          └── RunState ◄───┘  (shared, typed, write-once)
//! ```
//!
//! Steps execute strictly sequentially; cleanup unwinds in reverse start
//! order in every terminal condition. Cancellation is cooperative: a
//! [`tokio_util::sync::CancellationToken`] is observed at every suspension
//! point, and any subprocess already started is still reaped by its owning
//! step's cleanup.
//!
//! The hypervisor command line, `qemu-img` invocations, and the seed-file
//! HTTP server are external collaborators: steps outside this crate launch
//! them and publish their coordinates (VNC port, HTTP address) into
//! [`RunState`].

pub mod bootcmd;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod steps;
pub mod template;
pub mod util;
pub mod vnc;

pub use config::Config;
pub use error::{ForgeError, ForgeResult};
pub use pipeline::{
    BoxedStep, ProvisionStep, RunDisposition, RunReport, StepOutcome, StepRunner,
};
pub use state::RunState;
