use std::path::Path;
use std::path::PathBuf;

use cordon_core::events::JsonlStdoutSink;
use cordon_core::events::MultiEventSink;
use cordon_core::history::HistoryLogger;
use cordon_core::session::SessionEventSink;
use cordon_core::session::SessionStore;

use crate::config::CONFIG_DIR;

pub mod approvals;
pub mod history;
pub mod patch;
pub mod run;
pub mod sandbox;

pub(crate) fn sessions_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(CONFIG_DIR).join("sessions")
}

pub(crate) fn history_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(CONFIG_DIR).join("history")
}

/// Every invocation writes its audit events to the session store and the
/// history log; `--json` additionally streams them to stdout.
pub(crate) fn audit_sink(workspace_root: &Path, session_id: &str, json: bool) -> MultiEventSink {
    let store = SessionStore::new(sessions_dir(workspace_root));
    let mut sink = MultiEventSink::new(vec![
        Box::new(SessionEventSink::new(store, session_id.to_string())),
        Box::new(HistoryLogger::new(history_dir(workspace_root))),
    ]);
    if json {
        sink.push(Box::new(JsonlStdoutSink));
    }
    sink
}

pub(crate) fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
