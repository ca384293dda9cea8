//! In-place scalar edits on YAML text.
//!
//! Chart files are hand-maintained and carry comments, quoting and key order
//! that a parse/serialize cycle through `serde_yaml` would lose. Instead, the
//! document is parsed only to validate lookups, and the scalar to change is
//! located in the text by following block-mapping indentation. Everything
//! outside the replaced scalar is kept byte for byte.
//!
//! Flow collections (`{a: 1}`) and block scalars (`|`, `>`) cannot be the
//! target of an edit.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use crate::core::{ReleaseError, ReleaseResult};

/// A block-mapping line: indentation, key, and everything after `:`.
static KEY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?P<indent> *)(?P<key>"(?:[^"\\]|\\.)*"|'(?:[^']|'')*'|[^\s#'"\-][^:#]*?|-[^\s:#][^:#]*?)\s*:(?:[ \t]+|$)"#,
    )
    .expect("key line pattern is valid")
});

/// Quoting style of an existing scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    /// Unquoted
    Plain,
    /// `'single'`
    SingleQuoted,
    /// `"double"`
    DoubleQuoted,
}

/// Replace the scalar at `path` with `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarEdit {
    /// Mapping keys from the document root
    pub path: Vec<String>,

    /// New string value
    pub value: String,
}

impl ScalarEdit {
    /// Create an edit from a key path.
    pub fn new<S: AsRef<str>>(path: &[S], value: impl Into<String>) -> Self {
        Self { path: path.iter().map(|s| s.as_ref().to_string()).collect(), value: value.into() }
    }

    /// Dotted form of the path, for messages.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Location of a scalar value inside the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalarSpan {
    /// Byte offset where the value starts (or where it would be inserted)
    start: usize,
    /// Byte offset one past the value
    end: usize,
    style: ScalarStyle,
    /// Whether the key had no inline value at all
    empty: bool,
}

/// Apply every edit to `text`, returning the new text.
///
/// `document` names the file in error messages. Fails without partial
/// results if any path cannot be found or is not a plain scalar.
pub fn apply_edits(text: &str, edits: &[ScalarEdit], document: &str) -> ReleaseResult<String> {
    let mut current = text.to_string();
    for edit in edits {
        current = set_scalar(&current, edit, document)?;
    }

    if !edits.is_empty() {
        verify_edits(&current, edits, document)?;
    }
    Ok(current)
}

/// Apply a single edit.
pub fn set_scalar(text: &str, edit: &ScalarEdit, document: &str) -> ReleaseResult<String> {
    let span = locate(text, &edit.path).ok_or_else(|| {
        ReleaseError::Lookup(format!(
            "key '{}' not found in {} (only block mappings can be edited)",
            edit.dotted_path(),
            document
        ))
    })?;

    let rendered = render_scalar(&edit.value, span.style);
    let mut out = String::with_capacity(text.len() + rendered.len());
    let (before, after) = (&text[..span.start], &text[span.end..]);
    out.push_str(before);
    if span.empty && !before.ends_with([' ', '\t']) {
        out.push(' ');
    }
    out.push_str(&rendered);
    if span.empty && after.starts_with('#') {
        out.push(' ');
    }
    out.push_str(after);

    tracing::debug!(path = %edit.dotted_path(), value = %edit.value, document, "Edited scalar");
    Ok(out)
}

/// Read the value at `path` from parsed YAML.
pub fn lookup<'v, S: AsRef<str>>(root: &'v Value, path: &[S]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, key| node.as_mapping()?.get(key.as_ref()))
}

/// Render `value` in `style`, switching a plain scalar to double quotes when
/// it would otherwise not read back as the same string.
pub fn render_scalar(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::Plain if is_plain_safe(value) => value.to_string(),
        ScalarStyle::SingleQuoted => format!("'{}'", value.replace('\'', "''")),
        ScalarStyle::Plain | ScalarStyle::DoubleQuoted => {
            format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
        }
    }
}

fn is_plain_safe(value: &str) -> bool {
    if value.is_empty() || value.trim() != value || value.contains(": ") || value.contains(" #") {
        return false;
    }
    if value.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c)) {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(ref s)) if s == value)
}

/// Find the value span for `path` by walking block-mapping lines.
fn locate<S: AsRef<str>>(text: &str, path: &[S]) -> Option<ScalarSpan> {
    if path.is_empty() {
        return None;
    }

    // (indent, key) of the mapping keys enclosing the current line
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut block_scalar_indent: Option<usize> = None;
    let mut offset = 0;

    for raw_line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += raw_line.len();
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some(block_indent) = block_scalar_indent {
            if trimmed.is_empty() || indent > block_indent {
                continue;
            }
            block_scalar_indent = None;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("---") {
            continue;
        }

        while stack.last().map_or(false, |(i, _)| *i >= indent) {
            stack.pop();
        }

        if trimmed == "-" || trimmed.starts_with("- ") {
            // Sequence items are opaque: nothing below them matches a key path.
            stack.push((indent, String::from("-")));
            continue;
        }

        let Some(caps) = KEY_LINE.captures(line) else { continue };
        let key = unquote_key(&caps["key"]);
        let value_start = caps.get(0).map_or(line.len(), |m| m.end());
        let rest = &line[value_start..];

        stack.push((indent, key));

        if rest.starts_with('|') || rest.starts_with('>') {
            block_scalar_indent = Some(indent);
        }

        let matches_path = stack.len() == path.len()
            && stack.iter().zip(path).all(|((_, k), p)| k == p.as_ref());
        if !matches_path {
            continue;
        }

        return scalar_span(rest).map(|(start, end, style, empty)| ScalarSpan {
            start: line_start + value_start + start,
            end: line_start + value_start + end,
            style,
            empty,
        });
    }

    None
}

/// Span of the scalar at the start of `rest`, relative to `rest`.
fn scalar_span(rest: &str) -> Option<(usize, usize, ScalarStyle, bool)> {
    let content = rest.trim_end();
    if content.is_empty() || content.starts_with('#') {
        return Some((0, 0, ScalarStyle::Plain, true));
    }

    match content.as_bytes()[0] {
        b'"' => {
            let mut escaped = false;
            for (i, c) in content.char_indices().skip(1) {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => return Some((0, i + 1, ScalarStyle::DoubleQuoted, false)),
                    _ => escaped = false,
                }
            }
            None
        }
        b'\'' => {
            let bytes = content.as_bytes();
            let mut i = 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    return Some((0, i + 1, ScalarStyle::SingleQuoted, false));
                }
                i += 1;
            }
            None
        }
        b'|' | b'>' | b'{' | b'[' | b'&' | b'*' | b'!' => None,
        _ => {
            let end = content.find(" #").or_else(|| content.find("\t#")).unwrap_or(content.len());
            Some((0, content[..end].trim_end().len(), ScalarStyle::Plain, false))
        }
    }
}

fn unquote_key(key: &str) -> String {
    let key = key.trim();
    if key.len() >= 2 && key.starts_with('"') && key.ends_with('"') {
        return key[1..key.len() - 1].replace("\\\"", "\"").replace("\\\\", "\\");
    }
    if key.len() >= 2 && key.starts_with('\'') && key.ends_with('\'') {
        return key[1..key.len() - 1].replace("''", "'");
    }
    key.to_string()
}

/// Re-parse the edited text and check every edit reads back as intended.
fn verify_edits(text: &str, edits: &[ScalarEdit], document: &str) -> ReleaseResult<()> {
    let parsed: Value = serde_yaml::from_str(text)?;
    for edit in edits {
        match lookup(&parsed, &edit.path) {
            Some(Value::String(s)) if *s == edit.value => {}
            other => {
                return Err(ReleaseError::Format(format!(
                    "edit of '{}' in {} reads back as {:?}",
                    edit.dotted_path(),
                    document,
                    other
                )))
            }
        }
    }
    Ok(())
}
