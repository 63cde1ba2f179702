//! Hex signature parsing and byte-pattern matching

use std::result::Result as StdResult;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ConfigError;

/// Which rule field a signature pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Magic,
    Header,
    Footer,
}

impl SignatureKind {
    pub fn field_name(self) -> &'static str {
        match self {
            SignatureKind::Magic => "magic_bytes",
            SignatureKind::Header => "header_signatures",
            SignatureKind::Footer => "footer_signatures",
        }
    }
}

/// Parsed signature patterns, keyed by category, extension and field.
///
/// Patterns come out of the config as hex text; parsing them once per
/// rule set keeps repeated validations off the hex decoder.
#[derive(Debug, Default)]
pub struct SignatureCache {
    parsed: DashMap<(String, String, SignatureKind), Arc<Vec<u8>>>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_parse(
        &self,
        category: &str,
        extension: &str,
        kind: SignatureKind,
        pattern: &str,
    ) -> StdResult<Arc<Vec<u8>>, ConfigError> {
        let key = (category.to_string(), extension.to_string(), kind);
        if let Some(hit) = self.parsed.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let bytes = Arc::new(parse_hex(pattern, category, extension, kind.field_name())?);
        self.parsed.insert(key, Arc::clone(&bytes));
        Ok(bytes)
    }
}

/// Decode a hex signature pattern into bytes.
///
/// Whitespace inside the pattern is ignored and an odd-length pattern
/// is zero-extended on the left, so "A 25" reads as `[0x0A, 0x25]`.
pub fn parse_hex(
    pattern: &str,
    category: &str,
    extension: &str,
    field: &'static str,
) -> StdResult<Vec<u8>, ConfigError> {
    let mut compact: String = pattern.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() % 2 != 0 {
        compact.insert(0, '0');
    }
    hex::decode(&compact).map_err(|err| ConfigError::InvalidSignature {
        category: category.to_string(),
        extension: extension.to_string(),
        field,
        detail: err.to_string(),
    })
}

/// True when the pattern occurs anywhere in the data.
pub fn contains_magic(data: &[u8], pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    data.windows(pattern.len()).any(|window| window == pattern)
}

/// True when the data starts with the pattern.
pub fn matches_header(data: &[u8], pattern: &[u8]) -> bool {
    data.starts_with(pattern)
}

/// True when the pattern sits one byte before the end of the data.
///
/// Footers are anchored rather than searched: the last byte is left
/// for a trailing terminator such as a newline.
pub fn matches_footer(data: &[u8], pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let Some(start) = data.len().checked_sub(pattern.len() + 1) else {
        return false;
    };
    &data[start..start + pattern.len()] == pattern
}
