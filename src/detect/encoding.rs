//! Shell-safe encoding of detector output.
//!
//! Values are serialized as compact JSON and every character outside a small
//! safe set is backslash-escaped, so the result survives as one unquoted
//! shell word. A shell evaluating the word yields the plain JSON again.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::ReleaseResult;

/// Characters that never need escaping in a POSIX shell word.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | '%' | '+')
}

/// Backslash-escape every shell metacharacter in `raw`.
pub fn shell_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() * 2);
    for c in raw.chars() {
        if !is_shell_safe(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Undo [`shell_escape`].
pub fn shell_unescape(escaped: &str) -> String {
    let mut raw = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                raw.push(next);
                continue;
            }
        }
        raw.push(c);
    }
    raw
}

/// Serialize `value` to a single shell-safe word.
pub fn encode_shell_arg<T: Serialize + ?Sized>(value: &T) -> ReleaseResult<String> {
    let json = serde_json::to_string(value)?;
    Ok(shell_escape(&json))
}

/// Parse an argument produced by [`encode_shell_arg`].
///
/// Accepts both the escaped form and plain JSON (what a shell hands over
/// after evaluating the escaped word).
pub fn decode_shell_arg<T: DeserializeOwned>(arg: &str) -> ReleaseResult<T> {
    let trimmed = arg.trim();
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(plain_err) => {
            tracing::debug!(error = %plain_err, "Argument is not plain JSON, unescaping");
            Ok(serde_json::from_str(&shell_unescape(trimmed))?)
        }
    }
}
