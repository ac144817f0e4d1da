//! Error types shared across the provisioning pipeline.

use thiserror::Error;

pub type ForgeResult<T> = Result<T, ForgeError>;

/// Errors produced while provisioning a VM image.
///
/// Every variant is fatal to the run; there is no retry anywhere in this
/// crate. `Config` aggregates all validation problems into one message so
/// the user can fix everything in a single edit cycle. Cleanup failures are
/// never represented here, they are logged and swallowed.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Invalid configuration values, aggregated before any step runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing executable, missing source file, unsupported host OS.
    #[error("environment error: {0}")]
    Environment(String),

    /// Remote-framebuffer handshake or transport failure.
    #[error("VNC protocol error: {0}")]
    Protocol(String),

    /// Boot command script could not be parsed.
    #[error("boot command error: {0}")]
    BootCommand(String),

    /// Boot command template interpolation failure.
    #[error("template error: {0}")]
    Template(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline-ordering bug, e.g. a step read state a producer never wrote.
    #[error("internal error: {0}")]
    Internal(String),
}
