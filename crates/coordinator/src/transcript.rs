// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript tail reading (spec §4.3): hooks report a `transcript-path`
//! pointing at the provider's session log JSONL file. Rather than tailing
//! it continuously, the hook handlers read the last chunk on demand and
//! extract the final assistant message from it.

use serde_json::Value;
use tracing::warn;

const TAIL_BYTES: u64 = 64 * 1024;

/// Extract the concatenated `text` blocks from an assistant JSONL entry.
/// `None` for non-assistant entries or assistant messages with no text
/// blocks (e.g. a bare tool-use turn).
pub fn extract_assistant_text(json: &Value) -> Option<String> {
    if json.get("type").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    let content = json.get("message")?.get("content")?.as_array()?;
    let texts: Vec<&str> = content
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }
    Some(texts.join("\n"))
}

/// Read the last `TAIL_BYTES` of `path` and return the final assistant
/// message found in it, scanning back-to-front so a long trailing tool-use
/// turn doesn't hide the preceding text. Read failures are logged and
/// treated as "no message" rather than propagated (spec §7: hook handlers
/// never fail the caller).
pub async fn last_assistant_message(path: &str) -> Option<String> {
    let contents = match read_tail(path).await {
        Ok(c) => c,
        Err(e) => {
            warn!(path, error = %e, "transcript tail read failed");
            return None;
        }
    };
    contents
        .lines()
        .rev()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find_map(|json| extract_assistant_text(&json))
}

async fn read_tail(path: &str) -> std::io::Result<String> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(TAIL_BYTES);
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
