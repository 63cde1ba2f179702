//! Mime type resolution and comparison

/// Effective mime type for a file: a non-blank caller hint wins,
/// otherwise the type is sniffed from the content.
pub fn resolve_mime(hint: Option<&str>, data: &[u8]) -> Option<String> {
    if let Some(hint) = hint {
        if !hint.trim().is_empty() {
            return Some(hint.to_string());
        }
    }
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// A mime mismatch needs both sides to be known: an unconfigured or
/// undetectable type never fails the check.
pub fn mime_matches(expected: &str, effective: Option<&str>) -> bool {
    if expected.trim().is_empty() {
        return true;
    }
    match effective {
        Some(actual) if !actual.trim().is_empty() => actual == expected,
        _ => true,
    }
}
