mod fixtures;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;

use filewarden::hash::{digest_hex, HashAlgorithm};
use filewarden::{FileValidator, ValidateOptions, ValidationConfig};
use fixtures::TestFixtures;

fn validator(config: Value) -> FileValidator {
    let config = ValidationConfig::from_value(config).expect("config parses");
    FileValidator::new(config).expect("validator builds")
}

#[tokio::test]
async fn minimal_pdf_passes_all_checks() {
    let v = validator(TestFixtures::get_documents_config());
    let bytes = TestFixtures::get_minimal_pdf();

    let response = v
        .validate_bytes("Documents", "a.pdf", bytes.clone())
        .await
        .unwrap();

    assert!(response.is_valid(), "details: {}", response.results_details());
    assert_eq!(response.results_info(), "File is valid: a.pdf");
    assert!(response
        .results_details()
        .contains("Magic bytes check passed, magic bytes: 25504446"));
    assert_eq!(response.file_bytes(), bytes.as_slice());
    assert_eq!(
        response.file_checksum(),
        Some(digest_hex(HashAlgorithm::Sha256, &bytes).as_str())
    );
    assert!(response.valid_file_path().is_none());
}

#[tokio::test]
async fn wrong_magic_bytes_invalidate_the_file() {
    let mut config = TestFixtures::get_documents_config();
    config["Validations"]["Documents"]["pdf"]["magic_bytes"] = "89504E47".into();
    let v = validator(config);

    let response = v
        .validate_bytes("Documents", "sample.pdf", TestFixtures::get_minimal_pdf())
        .await
        .unwrap();

    assert!(!response.is_valid());
    assert_eq!(
        response.results_info(),
        "File validation failed for sample.pdf"
    );
    assert!(response
        .results_details()
        .contains("Invalid magic_bytes for file: sample.pdf"));
}

#[tokio::test]
async fn oversized_files_report_both_sizes() {
    let mut config = TestFixtures::get_documents_config();
    config["Validations"]["Documents"]["pdf"]["max_size"] = 1.into();
    let v = validator(config);

    let response = v
        .validate_bytes("Documents", "big.pdf", TestFixtures::get_padded_pdf(2))
        .await
        .unwrap();

    assert!(!response.is_valid());
    assert!(response.results_details().contains(
        "Invalid file size (2KB) exceeds maximum allowed size (1KB) for file: big.pdf"
    ));
}

#[tokio::test]
async fn fail_fast_reports_only_the_first_failure() {
    let mut config = TestFixtures::get_documents_config();
    config["Validations"]["Documents"]["pdf"]["max_size"] = 1.into();
    config["Validations"]["Documents"]["pdf"]["magic_bytes"] = "89504E47".into();
    config["Validations"]["Documents"]["pdf"]["fail_fast"] = true.into();
    let v = validator(config);

    let response = v
        .validate_bytes("Documents", "big.pdf", TestFixtures::get_padded_pdf(2))
        .await
        .unwrap();

    assert!(!response.is_valid());
    assert!(response.results_details().starts_with("\n1. Invalid file size"));
    assert!(!response.results_details().contains("\n2."));
    assert!(!response.results_details().contains("magic_bytes"));
}

#[tokio::test]
async fn unsafe_names_are_cleaned() {
    let v = validator(TestFixtures::get_documents_config());

    let response = v
        .validate_bytes(
            "Documents",
            "my report (1).pdf",
            TestFixtures::get_minimal_pdf(),
        )
        .await
        .unwrap();

    assert_eq!(response.clean_file_name(), "my_report__1_.pdf");
    assert!(response.results_info().ends_with("my_report__1_.pdf"));
}

#[tokio::test]
async fn valid_files_are_saved_under_the_encoded_name() {
    let out = tempfile::tempdir().unwrap();
    let mut config = TestFixtures::get_documents_config();
    config["Validations"]["Documents"]["pdf"]["name_encoding"] = true.into();
    let v = validator(config);

    let options = ValidateOptions::new().with_output_dir(out.path());
    let response = v
        .validate_bytes_with(
            "Documents",
            "report.pdf",
            TestFixtures::get_minimal_pdf(),
            &options,
        )
        .await
        .unwrap();

    assert!(response.is_valid());
    assert!(response
        .results_info()
        .starts_with("File is valid and was saved to output directory:"));

    let expected_name = format!("{}.pdf", BASE64.encode(b"report.pdf"));
    let saved = response.valid_file_path().expect("saved path");
    assert!(saved.ends_with(&expected_name), "saved as {}", saved.display());
    assert_eq!(
        std::fs::read(saved).unwrap(),
        TestFixtures::get_minimal_pdf()
    );
}

#[tokio::test]
async fn checksums_can_be_disabled_per_rule_set() {
    let mut config = TestFixtures::get_documents_config();
    config["Validations"]["Documents"]["pdf"]["add_checksum"] = false.into();
    let v = validator(config);

    let response = v
        .validate_bytes("Documents", "a.pdf", TestFixtures::get_minimal_pdf())
        .await
        .unwrap();

    assert!(response.is_valid());
    assert_eq!(response.file_checksum(), None);
}

#[tokio::test]
async fn footer_signatures_need_their_trailing_byte() {
    let v = validator(TestFixtures::get_documents_config());

    let response = v
        .validate_bytes("Documents", "a.pdf", TestFixtures::get_truncated_pdf())
        .await
        .unwrap();

    assert!(!response.is_valid());
    assert!(response
        .results_details()
        .contains("Invalid footer_signatures for file: a.pdf"));
}

#[tokio::test]
async fn save_failures_downgrade_but_stay_valid() {
    let out = tempfile::tempdir().unwrap();
    let missing = out.path().join("not_created");
    let v = validator(TestFixtures::get_documents_config());

    let options = ValidateOptions::new().with_output_dir(&missing);
    let response = v
        .validate_bytes_with(
            "Documents",
            "a.pdf",
            TestFixtures::get_minimal_pdf(),
            &options,
        )
        .await
        .unwrap();

    assert!(response.is_valid());
    assert!(response
        .results_info()
        .starts_with("File is valid but failed to save to output directory:"));
    assert!(response.valid_file_path().is_none());
}

#[tokio::test]
async fn a_trusted_mime_hint_overrides_sniffing() {
    let v = validator(TestFixtures::get_documents_config());

    let options = ValidateOptions::new().with_mime_type("text/plain");
    let response = v
        .validate_bytes_with(
            "Documents",
            "a.pdf",
            TestFixtures::get_minimal_pdf(),
            &options,
        )
        .await
        .unwrap();

    assert!(!response.is_valid());
    assert!(response
        .results_details()
        .contains("Invalid mime_type for file: a.pdf"));
}

#[tokio::test]
async fn png_rules_validate_png_content() {
    let config = serde_json::json!({
        "Validations": {
            "Images": {
                "png": {
                    "mime_type": "image/png",
                    "header_signatures": "89504E470D0A1A0A"
                }
            }
        }
    });
    let v = validator(config);

    let response = v
        .validate_bytes("Images", "logo.png", TestFixtures::get_png_header())
        .await
        .unwrap();
    assert!(response.is_valid(), "details: {}", response.results_details());

    let response = v
        .validate_bytes("Images", "fake.png", TestFixtures::get_minimal_pdf())
        .await
        .unwrap();
    assert!(!response.is_valid());
}

#[tokio::test]
async fn path_validation_names_the_file_from_its_last_component() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annual report.pdf");
    std::fs::write(&path, TestFixtures::get_minimal_pdf()).unwrap();

    let v = validator(TestFixtures::get_documents_config());
    let response = v.validate_path("Documents", &path).await.unwrap();

    assert!(response.is_valid(), "details: {}", response.results_details());
    assert_eq!(response.clean_file_name(), "annual_report.pdf");
    assert_eq!(response.results_info(), "File is valid: annual_report.pdf");
}

#[tokio::test]
async fn unreadable_paths_are_hard_errors() {
    let v = validator(TestFixtures::get_documents_config());
    let err = v
        .validate_path(
            "Documents",
            std::path::Path::new("/no/such/dir/missing.pdf"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, filewarden::Error::Io(_)));
}
