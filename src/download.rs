use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::types::ChatId;

/// Deterministic dump filename: `chat_{id}.json` with every character
/// outside `[A-Za-z0-9._@-]` replaced by `_`.
#[must_use]
pub fn dump_file_name(chat_id: &ChatId) -> String {
    let sanitized: String = chat_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("chat_{sanitized}.json")
}

/// Writes `messages` as pretty-printed JSON into `dir`, replacing any
/// earlier dump of the same chat. Returns the written path.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub async fn save_messages(dir: &Path, chat_id: &ChatId, messages: &JsonValue) -> Result<PathBuf, Error> {
    let path = dir.join(dump_file_name(chat_id));
    let json = serde_json::to_string_pretty(messages).map_err(Error::Serialization)?;
    tokio::fs::write(&path, json).await?;
    tracing::info!(path = %path.display(), "Saved chat messages");
    Ok(path)
}
