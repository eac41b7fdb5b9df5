use std::path::PathBuf;

use cordon_apply_patch::PatchError;
use cordon_protocol::SandboxMode;
use thiserror::Error;

/// An action tried to leave its declared trust boundary. Always fatal to the
/// current action, never retried.
#[derive(Debug, Error)]
pub enum SandboxViolation {
    #[error("writing to {} is not permitted in sandbox mode {mode}", path.display())]
    WriteDenied { path: PathBuf, mode: SandboxMode },

    #[error("execution is not allowed in read-only sandbox mode without explicit approval")]
    ExecReadOnly,

    #[error("execution cwd {} is not permitted in sandbox mode {mode}", cwd.display())]
    ExecCwdDenied { cwd: PathBuf, mode: SandboxMode },

    #[error("network access to {host} is not allowed in sandbox mode {mode}")]
    NetworkDenied { host: String, mode: SandboxMode },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Sandbox(#[from] SandboxViolation),

    #[error(transparent)]
    Patch(#[from] PatchError),

    /// The underlying process could not be started at all. Ordinary non-zero
    /// exits are not errors.
    #[error("failed to spawn command: {0}")]
    Spawn(std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
