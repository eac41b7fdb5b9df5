use std::path::Path;

use cordon_core::events::emit;
use cordon_protocol::AuditEvent;
use cordon_protocol::EventKind;
use serde_json::json;

use crate::cli::ApprovalsAction;
use crate::cli::ApprovalsArgs;
use crate::commands::audit_sink;
use crate::commands::new_session_id;
use crate::config::ConfigFile;

pub async fn run(args: ApprovalsArgs, workspace_root: &Path, json: bool) -> anyhow::Result<u8> {
    match args.action {
        ApprovalsAction::Get => {
            let config = ConfigFile::load(workspace_root).await?;
            println!("{}", config.approvals.policy);
            Ok(0)
        }
        ApprovalsAction::Set { policy } => {
            let mut config = ConfigFile::load(workspace_root).await?;
            let previous = config.approvals.policy;
            config.approvals.policy = policy;
            config.persist(workspace_root).await?;

            let session_id = new_session_id();
            let sink = audit_sink(workspace_root, &session_id, json);
            emit(
                &sink,
                AuditEvent::new(
                    EventKind::ApprovalsSet,
                    &session_id,
                    Some(json!({ "policy": policy, "previous": previous })),
                ),
            )
            .await;

            if !json {
                println!("approval policy set to {policy}");
            }
            Ok(0)
        }
    }
}
