//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Free-form protocol identifier: any text without control characters
static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\P{Cc}+$").unwrap()
});

const MAX_IDENTIFIER_CHARS: usize = 256;

fn validate_identifier(value: &str) -> bool {
    !value.trim().is_empty()
        && value.chars().count() <= MAX_IDENTIFIER_CHARS
        && IDENTIFIER_REGEX.is_match(value)
}

/// Validate a tool name. Servers choose their own names, so only blank,
/// oversized or control-character names are refused.
pub fn validate_tool_name(name: &str) -> bool {
    validate_identifier(name)
}

/// Validate a protocol method name such as `tools/call`
pub fn validate_method(method: &str) -> bool {
    validate_identifier(method)
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
