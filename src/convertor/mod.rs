//! Convertors for JSON-encoded crash reports.
//!
//! Two vendors ship crashes as JSON rather than plaintext. Instead of
//! teaching every downstream consumer both schemas, these convertors project
//! the JSON into the canonical Apple plaintext form; the regular Apple
//! parser then runs on the output. Membership is decided by structural
//! inspection of the JSON, never by substring search, and conversion is
//! best-effort: a missing field becomes an empty string, never an error.

mod apple_json;
mod keep_json;

use std::borrow::Cow;

use log::debug;
use serde_json::Value;

pub use apple_json::AppleJsonConvertor;
pub use keep_json::KeepJsonConvertor;

/// The JSON dialects a report can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertorKind {
    /// Apple `.ips` two-document form (header line + payload document).
    AppleJson,
    /// "Keep" single-document form.
    KeepJson,
}

impl ConvertorKind {
    /// Structurally inspect the content and pick the matching convertor.
    pub fn detect(content: &str) -> Option<ConvertorKind> {
        if AppleJsonConvertor::matches(content) {
            Some(ConvertorKind::AppleJson)
        } else if KeepJsonConvertor::matches(content) {
            Some(ConvertorKind::KeepJson)
        } else {
            None
        }
    }

    /// Produce the canonical Apple plaintext projection.
    pub fn convert(&self, content: &str) -> String {
        match self {
            ConvertorKind::AppleJson => AppleJsonConvertor.convert(content),
            ConvertorKind::KeepJson => KeepJsonConvertor.convert(content),
        }
    }
}

/// Convert JSON input to canonical plaintext; pass plaintext through.
pub fn preprocess(content: &str) -> Cow<'_, str> {
    match ConvertorKind::detect(content) {
        Some(kind) => {
            debug!("converting {:?} report to canonical form", kind);
            Cow::Owned(kind.convert(content))
        }
        None => Cow::Borrowed(content),
    }
}

/// The value's text, the way a report renders it: strings verbatim, numbers
/// by their decimal representation, everything else empty.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Integer value, tolerating numbers encoded as strings. Missing or
/// malformed values read as zero.
fn int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Left-justify into a fixed-width column, always leaving at least one
/// trailing space so overlong names cannot fuse with the next column.
fn pad(s: &str, width: usize) -> String {
    if s.len() >= width {
        format!("{s} ")
    } else {
        format!("{s:<width$}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plaintext_passes_through_untouched() {
        let content = "Process: demo [1111]\n";
        assert!(matches!(preprocess(content), Cow::Borrowed(_)));
        assert!(ConvertorKind::detect(content).is_none());
    }

    #[test]
    fn malformed_json_is_not_detected() {
        assert!(ConvertorKind::detect("{ not json").is_none());
        assert!(ConvertorKind::detect("{}").is_none());
    }

    #[test]
    fn value_text_coercion() {
        assert_eq!(text(&json!("abc")), "abc");
        assert_eq!(text(&json!(42)), "42");
        assert_eq!(text(&json!(null)), "");
        assert_eq!(text(&json!({"a": 1})), "");

        assert_eq!(int(&json!(42)), 42);
        assert_eq!(int(&json!("42")), 42);
        assert_eq!(int(&json!(null)), 0);
    }

    #[test]
    fn padding_never_fuses_columns() {
        assert_eq!(pad("demo", 8), "demo    ");
        assert_eq!(pad("exactly8", 8), "exactly8 ");
        assert_eq!(pad("longer-than-width", 8), "longer-than-width ");
    }
}
