//! Compiler configuration: the VM's compression parameters and canonicalizer
//! settings, loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical::CanonicalizerConfig;
use crate::encoding::CompressEncoding;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Error reading configuration {path}")]
    #[diagnostic(
        code("CONFIG-001"),
        help("Check that the file exists and is readable")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code("CONFIG-002"),
        help("Encodings are tables with an integer `base` and `shift`")
    )]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {kind} encoding {encoding}: shift must be below 64")]
    #[diagnostic(
        code("CONFIG-003"),
        help("The shift is the alignment of compressed values in bits, typically 0 or 3")
    )]
    InvalidEncoding {
        kind: &'static str,
        encoding: CompressEncoding,
    },
}

/// How the target VM lays out compressed references and class pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub use_compressed_oops: bool,
    pub use_compressed_class_pointers: bool,
    pub oop_encoding: CompressEncoding,
    pub klass_encoding: CompressEncoding,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            use_compressed_oops: true,
            use_compressed_class_pointers: true,
            oop_encoding: CompressEncoding::new(0, 3),
            klass_encoding: CompressEncoding::new(0x8_0000_0000, 3),
        }
    }
}

impl VmConfig {
    /// Rejects encodings whose arithmetic is undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, encoding) in [("oop", self.oop_encoding), ("klass", self.klass_encoding)] {
            if !encoding.is_valid() {
                return Err(ConfigError::InvalidEncoding { kind, encoding });
            }
        }
        Ok(())
    }

    /// The encoding for object references, if they are compressed.
    pub fn oop_encoding(&self) -> Option<CompressEncoding> {
        self.use_compressed_oops.then_some(self.oop_encoding)
    }

    /// The encoding for class pointers, if they are compressed.
    pub fn klass_encoding(&self) -> Option<CompressEncoding> {
        self.use_compressed_class_pointers.then_some(self.klass_encoding)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub vm: VmConfig,
    pub canonicalizer: CanonicalizerConfig,
}

impl CompilerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig = toml::from_str(content)?;
        config.vm.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loading compiler configuration from {}", path.display());
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CompilerConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.vm.oop_encoding(), Some(CompressEncoding::new(0, 3)));
    }

    #[test]
    fn disabled_compression_has_no_encoding() {
        let config = CompilerConfig::from_toml_str(
            r#"
            [vm]
            use_compressed_oops = false
            "#,
        )
        .expect("config parses");
        assert_eq!(config.vm.oop_encoding(), None);
        assert!(config.vm.klass_encoding().is_some());
    }
}
