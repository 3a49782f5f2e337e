use std::io::Write;

use tessera_ir::{CompilerConfig, CompressEncoding, ConfigError};

#[test]
fn loads_encodings_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
[vm]
use_compressed_oops = true
use_compressed_class_pointers = true

[vm.oop_encoding]
base = 4096
shift = 3

[vm.klass_encoding]
base = 34359738368
shift = 0

[canonicalizer]
max_rewrites = 500
"#
    )
    .expect("write config");

    let config = CompilerConfig::load(file.path()).expect("config loads");
    assert_eq!(config.vm.oop_encoding(), Some(CompressEncoding::new(4096, 3)));
    assert_eq!(config.vm.klass_encoding(), Some(CompressEncoding::new(0x8_0000_0000, 0)));
    assert_eq!(config.canonicalizer.max_rewrites, 500);
    assert!(config.canonicalizer.remove_dead_nodes);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = CompilerConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn malformed_encoding_is_a_parse_error() {
    let err = CompilerConfig::from_toml_str("[vm.oop_encoding]\nbase = \"zero\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn shift_past_the_word_width_is_rejected() {
    let err = CompilerConfig::from_toml_str("[vm.klass_encoding]\nbase = 0\nshift = 64\n").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidEncoding { kind: "klass", encoding } if encoding == CompressEncoding::new(0, 64)
    ));
    assert_eq!(
        err.to_string(),
        "Invalid klass encoding [base=0x0, shift=64]: shift must be below 64"
    );
    assert_eq!(miette::Diagnostic::code(&err).map(|c| c.to_string()).as_deref(), Some("CONFIG-003"));

    let widest = CompilerConfig::from_toml_str("[vm.oop_encoding]\nbase = 0\nshift = 63\n").expect("shift 63 is valid");
    assert_eq!(widest.vm.oop_encoding, CompressEncoding::new(0, 63));
}
