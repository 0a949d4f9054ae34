//! Structured-output recovery for generated text.
//!
//! Reasoning workers return free text that should contain one JSON record,
//! but the record may be wrapped in prose or code fences, or cut mid-token by
//! an upstream length limit. This module recovers the record through a
//! strictly staged repair pipeline, ordered least- to most-destructive so the
//! most information survives:
//!
//! 1. brace extraction — slice from the first `{` to the last `}` and parse;
//! 2. string closure — re-escape raw control characters inside strings and
//!    close a string left open at end of input;
//! 3. smart truncation — cut back to the last offset where nesting depth
//!    returned to zero, discarding trailing garbage;
//! 4. brace completion — append the closers for any still-open structures.
//!
//! The repair is purely syntactic: values are never edited, only structure.
//! Exhausting all four stages is a terminal failure for that agent's turn.

use serde_json::Value;
use tracing::debug;

/// How many characters of the original text a terminal error carries.
const ERROR_PREFIX_LEN: usize = 80;

/// Error type for recovery failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecoveryError {
    #[error("No JSON object found in {original_len} chars of output: {prefix:?}")]
    NoStructure { original_len: usize, prefix: String },

    #[error("Unrecoverable output after all repair stages ({original_len} chars): {prefix:?}")]
    Unrecoverable { original_len: usize, prefix: String },
}

/// Result type for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

fn prefix_of(raw: &str) -> String {
    raw.chars().take(ERROR_PREFIX_LEN).collect()
}

/// Recover one JSON record from an arbitrary text blob.
pub fn recover_json(raw: &str) -> RecoveryResult<Value> {
    // Stage 1: strip surrounding prose and parse directly.
    let extracted = extract_object(raw).ok_or_else(|| RecoveryError::NoStructure {
        original_len: raw.len(),
        prefix: prefix_of(raw),
    })?;

    if let Ok(value) = serde_json::from_str::<Value>(extracted) {
        return Ok(value);
    }

    // Stage 2: repair string state, then retry. Later stages operate on this
    // repaired buffer so a closed string does not hide structural damage.
    let repaired = repair_strings(extracted);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        debug!(stage = 2, "Recovered via string closure");
        return Ok(value);
    }

    // Stage 3: truncate to the last balanced offset.
    if let Some(balanced) = truncate_to_balanced(&repaired) {
        if let Ok(value) = serde_json::from_str::<Value>(balanced) {
            debug!(stage = 3, "Recovered via smart truncation");
            return Ok(value);
        }
    }

    // Stage 4: close whatever is still open.
    let completed = complete_structures(&repaired);
    if let Ok(value) = serde_json::from_str::<Value>(&completed) {
        debug!(stage = 4, "Recovered via brace completion");
        return Ok(value);
    }

    Err(RecoveryError::Unrecoverable {
        original_len: raw.len(),
        prefix: prefix_of(raw),
    })
}

/// Stage 1: locate the candidate object between the first `{` and the last
/// `}`. With no closing brace in sight, the slice runs to end of input so
/// later stages can work on the truncated body.
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    match raw.rfind('}') {
        Some(end) if end > start => Some(&raw[start..=end]),
        _ => Some(&raw[start..]),
    }
}

/// Stage 2: re-scan tracking string/escape state. Raw newlines, carriage
/// returns, and tabs inside a string are re-escaped; a string still open at
/// the end of input gets a synthetic closing quote.
fn repair_strings(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    if in_string {
        // A trailing backslash would swallow the synthetic quote.
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    out
}

/// Stage 3: find the last offset at which `{}`/`[]` nesting (outside of
/// strings) returned to zero, and cut there. Returns `None` when the input
/// never closes its first structure.
fn truncate_to_balanced(input: &str) -> Option<&str> {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_balanced = None;

    for (idx, ch) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    last_balanced = Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    last_balanced.map(|end| &input[..end])
}

/// Stage 4: append the matching closers for any structures still open
/// outside of strings.
fn complete_structures(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(input.len() + stack.len());
    out.push_str(input);
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_json_is_idempotent() {
        let raw = r#"{"a": 1, "b": "hello", "c": [1, 2, 3]}"#;
        let direct: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(recover_json(raw).unwrap(), direct);
    }

    #[test]
    fn test_prose_wrapped_json() {
        let raw = "Here is the event you asked for:\n{\"title\": \"Ambush\"}\nHope it fits!";
        assert_eq!(recover_json(raw).unwrap(), json!({"title": "Ambush"}));
    }

    #[test]
    fn test_code_fenced_json() {
        let raw = "```json\n{\"title\": \"Ambush\", \"power\": 6}\n```";
        assert_eq!(
            recover_json(raw).unwrap(),
            json!({"title": "Ambush", "power": 6})
        );
    }

    #[test]
    fn test_truncated_open_string() {
        // The documented recovery case: unterminated string, no closing brace.
        let raw = r#"{"a":1,"b":"hello"#;
        assert_eq!(recover_json(raw).unwrap(), json!({"a": 1, "b": "hello"}));
    }

    #[test]
    fn test_raw_newline_inside_string() {
        let raw = "{\"text\": \"line one\nline two\"}";
        assert_eq!(
            recover_json(raw).unwrap(),
            json!({"text": "line one\nline two"})
        );
    }

    #[test]
    fn test_trailing_garbage_after_last_brace() {
        // Stage 1 slices to the last `}`, which here sits at the balanced point.
        let raw = r#"{"a": 1} and then the model kept talking"#;
        assert_eq!(recover_json(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_stray_closer_truncated() {
        // The final `}` is garbage; stage 3 cuts back to the last balanced
        // offset instead.
        let raw = r#"{"a": 1} stray closer }"#;
        assert_eq!(recover_json(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_unclosed_nested_structures() {
        let raw = r#"{"choices": [{"label": "fight", "risk": "risky"}"#;
        assert_eq!(
            recover_json(raw).unwrap(),
            json!({"choices": [{"label": "fight", "risk": "risky"}]})
        );
    }

    #[test]
    fn test_truncated_mid_escape() {
        let raw = r#"{"text": "she said \"#;
        // The dangling backslash is dropped so the synthetic quote closes
        // the string, then stage 4 closes the object.
        assert_eq!(recover_json(raw).unwrap(), json!({"text": "she said "}));
    }

    #[test]
    fn test_no_structure_at_all() {
        let err = recover_json("the swamp was quiet that morning").unwrap_err();
        assert!(matches!(err, RecoveryError::NoStructure { .. }));
    }

    #[test]
    fn test_unrecoverable_carries_diagnostics() {
        let raw = "{]]]]";
        let err = recover_json(raw).unwrap_err();
        match err {
            RecoveryError::Unrecoverable {
                original_len,
                prefix,
            } => {
                assert_eq!(original_len, raw.len());
                assert!(prefix.starts_with('{'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_values_are_never_edited() {
        // A value containing braces inside a string must survive untouched.
        let raw = r#"prefix {"snippet": "if (x) { return; }"} suffix"#;
        assert_eq!(
            recover_json(raw).unwrap(),
            json!({"snippet": "if (x) { return; }"})
        );
    }
}
