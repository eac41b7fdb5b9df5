//! Sparse allow-listed projection of the parent environment for child
//! processes.

use std::collections::HashMap;

/// Keep exactly the allow-listed keys that exist in `source`. Exact key
/// match only; absent keys are omitted, never defaulted.
pub fn build_env(
    allowlist: &[String],
    source: &HashMap<String, String>,
) -> HashMap<String, String> {
    allowlist
        .iter()
        .filter_map(|key| {
            source
                .get(key)
                .map(|value| (key.clone(), value.clone()))
        })
        .collect()
}

/// Snapshot of the current process environment, in the shape `build_env`
/// consumes.
pub fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}
