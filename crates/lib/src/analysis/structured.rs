//! # Structured Response Extraction
//!
//! Recovers the first complete JSON object from free-form model output.
//! Markdown fences are stripped, the whole text is tried as JSON, and
//! otherwise a brace-matching scan proposes candidate spans until one parses.
//!
//! The work is bounded by a cooperative deadline: elapsed time is checked at
//! the start, periodically inside the scan and before every parse attempt.

use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Bytes scanned between two deadline checks.
const CHECK_INTERVAL: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("No JSON object found in model output")]
    NotFound,
    #[error("Extraction exceeded its time limit of {limit:?}")]
    TimedOut { limit: Duration },
    #[error("None of {candidates} candidate object(s) parsed; last error: {last_error}")]
    ParseFailure { candidates: usize, last_error: String },
}

/// A complete JSON object, or a typed failure. Never partial data.
pub type ExtractionResult = Result<Map<String, Value>, ExtractionError>;

struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self) -> Result<(), ExtractionError> {
        if self.started.elapsed() >= self.limit {
            Err(ExtractionError::TimedOut { limit: self.limit })
        } else {
            Ok(())
        }
    }
}

/// Extracts the first well-formed JSON object from `raw` within `time_limit`.
pub fn extract_structured(raw: &str, time_limit: Duration) -> ExtractionResult {
    let deadline = Deadline::new(time_limit);
    deadline.check()?;

    let cleaned = strip_fences(raw);
    deadline.check()?;
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        return Ok(map);
    }
    debug!("Direct JSON parse failed, scanning for an embedded object");
    scan(cleaned, &deadline)
}

/// Removes a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ```` fence. Fences inside the text are left alone.
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

fn scan(text: &str, deadline: &Deadline) -> ExtractionResult {
    let bytes = text.as_bytes();
    let Some(mut start) = text.find('{') else {
        return Err(ExtractionError::NotFound);
    };
    let mut candidates = 0usize;
    let mut last_error = String::new();

    loop {
        let Some(end) = matching_brace(bytes, start, deadline)? else {
            break;
        };
        candidates += 1;
        deadline.check()?;

        let span = &text[start..=end];
        match serde_json::from_str::<Map<String, Value>>(span) {
            Ok(map) => return Ok(map),
            Err(e) => {
                debug!("Candidate {candidates} failed to parse: {e}");
                last_error = e.to_string();
            }
        }

        match text[end + 1..].find('{') {
            Some(offset) => start = end + 1 + offset,
            None => break,
        }
    }

    if candidates == 0 {
        Err(ExtractionError::NotFound)
    } else {
        Err(ExtractionError::ParseFailure {
            candidates,
            last_error,
        })
    }
}

/// Returns the index of the brace closing the object opened at `start`, or
/// `None` when the text ends first.
fn matching_brace(
    bytes: &[u8],
    start: usize,
    deadline: &Deadline,
) -> Result<Option<usize>, ExtractionError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if offset % CHECK_INTERVAL == 0 {
            deadline.check()?;
        }
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(Some(start + offset));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_fences("text ```x``` text"), "text ```x``` text");
    }
}
