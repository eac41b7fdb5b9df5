use std::path::Path;

use cordon_core::session::SessionStore;

use crate::EXIT_FAILURE;
use crate::cli::HistoryArgs;
use crate::commands::sessions_dir;

pub async fn run(args: HistoryArgs, workspace_root: &Path, json: bool) -> anyhow::Result<u8> {
    let store = SessionStore::new(sessions_dir(workspace_root));

    let session_id = match args.session_id {
        Some(id) => id,
        None => match store.last_session_id().await? {
            Some(id) => id,
            None => {
                eprintln!("cordon: no recorded sessions");
                return Ok(EXIT_FAILURE);
            }
        },
    };

    let events = match store.read(&session_id).await {
        Ok(events) => events,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("cordon: unknown session {session_id}");
            return Ok(EXIT_FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    for event in &events {
        if json {
            println!("{}", serde_json::to_string(event)?);
        } else {
            match &event.data {
                Some(data) => println!("{} {} {data}", event.ts, event.kind),
                None => println!("{} {}", event.ts, event.kind),
            }
        }
    }
    Ok(0)
}
