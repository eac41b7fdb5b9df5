//! Workspace configuration file: `.cordon/config.toml`. Fully resolved here
//! before anything in the core is called; the core itself never reads files
//! or the environment for configuration.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use cordon_core::sandbox::SandboxConfig;
use cordon_protocol::ApprovalPolicy;
use cordon_protocol::SandboxMode;
use serde::Deserialize;
use serde::Serialize;

pub const CONFIG_DIR: &str = ".cordon";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub sandbox: SandboxSection,
    pub approvals: ApprovalsSection,
    pub exec: ExecSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub mode: SandboxMode,
    pub writable_roots: Vec<PathBuf>,
    pub allow_restricted_network: bool,
    pub allowed_domain_suffix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalsSection {
    pub policy: ApprovalPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecSection {
    pub timeout_ms: Option<u64>,
    /// When set, child processes see exactly these variables and nothing else.
    pub env_allowlist: Option<Vec<String>>,
}

impl ConfigFile {
    pub fn path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load the workspace config, falling back to defaults when no file
    /// exists yet. A present-but-malformed file is an error, not a default.
    pub async fn load(workspace_root: &Path) -> anyhow::Result<Self> {
        let path = Self::path(workspace_root);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub async fn persist(&self, workspace_root: &Path) -> anyhow::Result<()> {
        let path = Self::path(workspace_root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let rendered = toml::to_string_pretty(self)?;
        tokio::fs::write(&path, rendered)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn sandbox_config(&self, workspace_root: &Path) -> SandboxConfig {
        SandboxConfig {
            mode: self.sandbox.mode,
            workspace_root: workspace_root.to_path_buf(),
            writable_roots: self.sandbox.writable_roots.clone(),
            allow_restricted_network: self.sandbox.allow_restricted_network,
            allowed_domain_suffix: self.sandbox.allowed_domain_suffix.clone(),
        }
    }
}
