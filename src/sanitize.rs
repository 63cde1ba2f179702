//! File name cleaning and encoding helpers

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9.]").unwrap();
}

/// Replace every character outside `[a-zA-Z0-9.]` with an underscore.
///
/// The cleaned name is what all response messages and saved files use;
/// the caller-supplied name is never written to disk.
pub fn clean_file_name(file_name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(file_name, "_").into_owned()
}

/// Extension after the last dot, without the dot.
///
/// Returns an empty string for dotless names and names ending in a dot.
pub fn file_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx + 1 < file_name.len() => &file_name[idx + 1..],
        _ => "",
    }
}

/// Base64-encode the cleaned name and re-append the plain extension
/// so the stored file keeps a usable suffix.
pub fn encode_file_name(clean_name: &str, extension: &str) -> String {
    format!("{}.{}", BASE64.encode(clean_name.as_bytes()), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_replaces_unsafe_characters() {
        assert_eq!(clean_file_name("my report (1).pdf"), "my_report__1_.pdf");
        assert_eq!(clean_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(clean_file_name("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn extension_is_text_after_last_dot() {
        assert_eq!(file_extension("report.v2.pdf"), "pdf");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("no_extension"), "");
        assert_eq!(file_extension("trailing_dot."), "");
    }

    #[test]
    fn encoded_name_keeps_extension_visible() {
        let encoded = encode_file_name("report.pdf", "pdf");
        assert!(encoded.ends_with(".pdf"));
        assert_eq!(encoded, format!("{}.pdf", BASE64.encode(b"report.pdf")));
    }
}
