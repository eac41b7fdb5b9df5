//! Action-safety core: the sandbox permission model, approval gating, the
//! transactional patch applier, and the sandboxed command runner, plus the
//! audit sinks they write to.
//!
//! Everything privileged flows through [`exec::run_command`] and
//! [`patch::apply_patch`], which consult the same [`sandbox::SandboxPolicy`]
//! before any side effect and emit an ordered audit trail around it.

pub mod approvals;
pub mod env_filter;
mod error;
pub mod events;
pub mod exec;
pub mod history;
pub mod patch;
pub mod sandbox;
pub mod session;

pub use error::CoreError;
pub use error::Result;
pub use error::SandboxViolation;
