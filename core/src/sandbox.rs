//! Pure containment decisions. The policy answers write/exec/network
//! questions from (mode, path, roots) alone; it is the single source of
//! truth consulted by both the command runner and the patch applier before
//! any mutation.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use cordon_protocol::SandboxMode;
use serde::Deserialize;
use serde::Serialize;

use crate::SandboxViolation;

/// Fully-resolved sandbox settings for one invocation. Constructed once from
/// configuration and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub mode: SandboxMode,
    pub workspace_root: PathBuf,
    #[serde(default)]
    pub writable_roots: Vec<PathBuf>,
    /// Restricted-network escape hatch: when set, outbound access is allowed
    /// for hosts under `allowed_domain_suffix` even outside full-access mode.
    #[serde(default)]
    pub allow_restricted_network: bool,
    #[serde(default)]
    pub allowed_domain_suffix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    mode: SandboxMode,
    workspace_root: PathBuf,
    writable_roots: Vec<PathBuf>,
    allow_restricted_network: bool,
    allowed_domain_suffix: Option<String>,
}

/// Lexically absolutize a path against the current directory and collapse
/// `.` and `..` components, so `/work/../etc` compares as `/etc` and can
/// never pass a prefix check against `/work`. Symlinks are deliberately not
/// resolved; containment is a prefix property of the declared paths, not of
/// the mounted filesystem.
fn absolutize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

impl SandboxPolicy {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            mode: config.mode,
            workspace_root: absolutize(&config.workspace_root),
            writable_roots: config.writable_roots.iter().map(|p| absolutize(p)).collect(),
            allow_restricted_network: config.allow_restricted_network,
            allowed_domain_suffix: config.allowed_domain_suffix,
        }
    }

    pub fn mode(&self) -> SandboxMode {
        self.mode
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn writable_roots(&self) -> &[PathBuf] {
        &self.writable_roots
    }

    /// True iff `path` is the workspace root or a true descendant of it.
    /// `Path::starts_with` matches whole components, so `/work-2` is never
    /// inside `/work`.
    pub fn is_inside_workspace(&self, path: &Path) -> bool {
        absolutize(path).starts_with(&self.workspace_root)
    }

    fn is_inside_writable_roots(&self, path: &Path) -> bool {
        let resolved = absolutize(path);
        self.writable_roots.iter().any(|root| resolved.starts_with(root))
    }

    pub fn is_write_allowed(&self, path: &Path) -> bool {
        match self.mode {
            SandboxMode::DangerFullAccess => true,
            SandboxMode::ReadOnly => false,
            SandboxMode::WorkspaceWrite => {
                self.is_inside_workspace(path) || self.is_inside_writable_roots(path)
            }
        }
    }

    pub fn assert_write_allowed(&self, path: &Path) -> Result<(), SandboxViolation> {
        if self.is_write_allowed(path) {
            Ok(())
        } else {
            Err(SandboxViolation::WriteDenied {
                path: absolutize(path),
                mode: self.mode,
            })
        }
    }

    pub fn is_exec_cwd_allowed(&self, cwd: &Path) -> bool {
        match self.mode {
            SandboxMode::DangerFullAccess => true,
            SandboxMode::ReadOnly => false,
            SandboxMode::WorkspaceWrite => {
                self.is_inside_workspace(cwd) || self.is_inside_writable_roots(cwd)
            }
        }
    }

    /// Gate command execution. An explicit approval (`override_granted`)
    /// lifts only the read-only-mode block; it never unlocks a cwd outside
    /// the declared roots.
    pub fn assert_exec_allowed(
        &self,
        cwd: &Path,
        override_granted: bool,
    ) -> Result<(), SandboxViolation> {
        if self.mode == SandboxMode::ReadOnly && !override_granted {
            return Err(SandboxViolation::ExecReadOnly);
        }
        if self.mode == SandboxMode::DangerFullAccess {
            return Ok(());
        }
        if self.is_inside_workspace(cwd) || self.is_inside_writable_roots(cwd) {
            Ok(())
        } else {
            Err(SandboxViolation::ExecCwdDenied {
                cwd: absolutize(cwd),
                mode: self.mode,
            })
        }
    }

    pub fn is_network_allowed(&self, hostname: &str) -> bool {
        if self.mode == SandboxMode::DangerFullAccess {
            return true;
        }
        if self.allow_restricted_network
            && let Some(suffix) = &self.allowed_domain_suffix
        {
            return !suffix.is_empty() && hostname.ends_with(suffix.as_str());
        }
        false
    }

    pub fn assert_network_allowed(&self, hostname: &str) -> Result<(), SandboxViolation> {
        if self.is_network_allowed(hostname) {
            Ok(())
        } else {
            Err(SandboxViolation::NetworkDenied {
                host: hostname.to_string(),
                mode: self.mode,
            })
        }
    }
}
