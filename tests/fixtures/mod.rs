#![allow(dead_code)]

use serde_json::{json, Value};

pub struct TestFixtures;

impl TestFixtures {
    /// A tiny but structurally honest PDF. The trailing newline after
    /// %%EOF matters: footer signatures anchor one byte before the end.
    pub fn get_minimal_pdf() -> Vec<u8> {
        b"%PDF-1.4
1 0 obj
<<
/Type /Catalog
/Pages 2 0 R
>>
endobj

2 0 obj
<<
/Type /Pages
/Kids []
/Count 0
>>
endobj

trailer
<<
/Size 3
/Root 1 0 R
>>
%%EOF
"
        .to_vec()
    }

    /// Same document without the byte after %%EOF.
    pub fn get_truncated_pdf() -> Vec<u8> {
        let mut bytes = Self::get_minimal_pdf();
        bytes.pop();
        bytes
    }

    /// A PDF padded past the given number of kilobytes.
    pub fn get_padded_pdf(kilobytes: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(std::iter::repeat(b' ').take(kilobytes * 1000 + 500));
        bytes.extend_from_slice(b"\n%%EOF\n");
        bytes
    }

    /// PNG signature plus the start of an IHDR chunk.
    pub fn get_png_header() -> Vec<u8> {
        vec![
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49,
            0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
        ]
    }

    /// Rules for Documents/pdf covering every built-in check.
    pub fn get_documents_config() -> Value {
        json!({
            "Validations": {
                "Documents": {
                    "pdf": {
                        "mime_type": "application/pdf",
                        "magic_bytes": "25504446",
                        "header_signatures": "25504446",
                        "footer_signatures": "2525454F46",
                        "max_size": 4000
                    }
                }
            }
        })
    }

    /// Documents/pdf rules wired to a single plugin step `av.step1`.
    pub fn get_config_with_step(step: Value) -> Value {
        json!({
            "Validations": {
                "Documents": {
                    "pdf": {
                        "magic_bytes": "25504446",
                        "footer_signatures": "2525454F46",
                        "extension_plugins": ["av.step1"]
                    }
                }
            },
            "Plugins": {
                "av": {
                    "step1.step": step
                }
            }
        })
    }
}
