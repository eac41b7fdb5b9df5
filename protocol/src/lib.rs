//! Shared types spoken between the cordon CLI and the safety core: sandbox
//! and approval enumerations plus the audit event payload written by the
//! command runner and patch applier.

mod config_types;
mod events;

pub use config_types::ApprovalKind;
pub use config_types::ApprovalPolicy;
pub use config_types::SandboxMode;
pub use events::AuditEvent;
pub use events::EventKind;
pub use events::SessionRef;
