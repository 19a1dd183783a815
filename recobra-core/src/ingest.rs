//! Transcript loading
//!
//! External collaborators own the transport format; this module covers the
//! one the CLI uses: JSONL, one message per line, e.g.
//!
//! ```text
//! {"sender":"agent","text":"Hola","sent_at":"2026-08-01T12:00:00Z"}
//! ```
//!
//! Malformed lines are skipped with a warning and never abort the load; a
//! record with a missing or non-string `text` is kept with empty text so the
//! classifier still sees the message position.

use crate::error::Result;
use crate::types::{ChatMessage, SenderRole, Transcript};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;

#[derive(Deserialize)]
struct RawMessage {
    sender: SenderRole,
    #[serde(default)]
    text: Option<serde_json::Value>,
    sent_at: DateTime<Utc>,
}

/// Result of loading a transcript file.
pub struct LoadedTranscript {
    pub transcript: Transcript,
    /// Per-line problems encountered while loading
    pub warnings: Vec<String>,
}

/// Load a transcript from a JSONL file.
pub fn load_transcript_jsonl(path: &Path) -> Result<LoadedTranscript> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    read_transcript_jsonl(reader)
}

/// Load a transcript from any JSONL reader.
pub fn read_transcript_jsonl(reader: impl BufRead) -> Result<LoadedTranscript> {
    let mut messages = Vec::new();
    let mut warnings = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawMessage = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                let warning = format!("line {}: skipping malformed record: {}", line_no + 1, e);
                tracing::warn!("{}", warning);
                warnings.push(warning);
                continue;
            }
        };

        // Non-string text survives as a malformed (empty) message
        let text = match raw.text {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => {
                let warning = format!(
                    "line {}: non-string text ({}), treating as empty",
                    line_no + 1,
                    other
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
                None
            }
            None => None,
        };

        messages.push(ChatMessage {
            sender: raw.sender,
            text,
            sent_at: raw.sent_at,
        });
    }

    Ok(LoadedTranscript {
        transcript: Transcript::new(messages),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_lines() {
        let input = concat!(
            "{\"sender\":\"agent\",\"text\":\"Hola\",\"sent_at\":\"2026-08-01T12:00:00Z\"}\n",
            "{\"sender\":\"customer\",\"text\":\"si\",\"sent_at\":\"2026-08-01T12:01:00Z\"}\n",
        );
        let loaded = read_transcript_jsonl(input.as_bytes()).unwrap();
        assert_eq!(loaded.transcript.len(), 2);
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.transcript.messages()[1].text(), "si");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let input = concat!(
            "not json at all\n",
            "{\"sender\":\"agent\",\"text\":\"Hola\",\"sent_at\":\"2026-08-01T12:00:00Z\"}\n",
            "{\"sender\":\"martian\",\"text\":\"x\",\"sent_at\":\"2026-08-01T12:02:00Z\"}\n",
        );
        let loaded = read_transcript_jsonl(input.as_bytes()).unwrap();
        assert_eq!(loaded.transcript.len(), 1);
        assert_eq!(loaded.warnings.len(), 2);
    }

    #[test]
    fn test_non_string_text_kept_as_empty() {
        let input = "{\"sender\":\"customer\",\"text\":42,\"sent_at\":\"2026-08-01T12:00:00Z\"}\n";
        let loaded = read_transcript_jsonl(input.as_bytes()).unwrap();
        assert_eq!(loaded.transcript.len(), 1);
        assert_eq!(loaded.transcript.messages()[0].text(), "");
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let input = "\n\n{\"sender\":\"agent\",\"text\":\"Hola\",\"sent_at\":\"2026-08-01T12:00:00Z\"}\n\n";
        let loaded = read_transcript_jsonl(input.as_bytes()).unwrap();
        assert_eq!(loaded.transcript.len(), 1);
        assert!(loaded.warnings.is_empty());
    }
}
