//! Provisioning step implementations.
//!
//! Each step is a [`crate::pipeline::ProvisionStep`]: a no-op guard when its
//! feature is disabled, a fatal error on any environment or protocol
//! failure, and a best-effort cleanup that releases whatever the run
//! acquired (subprocesses, temp state, staged files).

pub mod boot_command;
pub mod efivars;
pub mod vtpm;

pub use boot_command::TypeBootCommandStep;
pub use efivars::PrepareEfivarsStep;
pub use vtpm::CreateVtpmStep;
