//! TOML configuration file support for power users.
//!
//! Instead of passing many CLI flags, users can specify settings in a config file:
//!
//! ```toml
//! # mzcodec.toml
//! [recode]
//! profile = "numpress"
//! threads = 8
//! batch_size = 500
//! skip_failures = true
//!
//! [recode.encoding.intensity]
//! precision = "float32"
//! compression = "zlib"
//! ```
//!
//! Command line flags win over the file, and the file wins over the profile.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use mzcodec::model::EncodingPolicy;

/// Root configuration structure for mzcodec.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Recode-specific settings.
    #[serde(default)]
    pub recode: RecodeConfig,
}

/// Configuration for the recode command.
#[derive(Debug, Default, Deserialize)]
pub struct RecodeConfig {
    /// Encoding profile name.
    pub profile: Option<String>,

    /// Worker threads for rendering records.
    pub threads: Option<usize>,

    /// Records per rendering batch.
    pub batch_size: Option<usize>,

    /// Leave out records that fail to convert instead of aborting.
    pub skip_failures: Option<bool>,

    /// Append the offset index.
    pub write_index: Option<bool>,

    /// Close the document with a SHA-1 `<fileChecksum>`.
    pub write_checksum: Option<bool>,

    /// Records between progress reports.
    pub progress_interval: Option<usize>,

    /// Per-array encoding, replacing the profile's.
    pub encoding: Option<EncodingPolicy>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mzcodec::binary::{Compression, Precision};

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [recode]
            profile = "numpress"
            threads = 8
            batch_size = 500
            skip_failures = true
            write_index = false
            write_checksum = false
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.recode.profile.as_deref(), Some("numpress"));
        assert_eq!(config.recode.threads, Some(8));
        assert_eq!(config.recode.batch_size, Some(500));
        assert_eq!(config.recode.skip_failures, Some(true));
        assert_eq!(config.recode.write_index, Some(false));
        assert_eq!(config.recode.write_checksum, Some(false));
        assert!(config.recode.encoding.is_none());
    }

    #[test]
    fn test_encoding_tables() {
        let toml = r#"
            [recode.encoding.intensity]
            precision = "float32"
            compression = "numpress-slof"
            error_tolerance = 0.001

            [recode.encoding.mz]
            compression = "none"
        "#;

        let config = Config::from_str(toml).unwrap();
        let encoding = config.recode.encoding.unwrap();
        assert_eq!(encoding.intensity.precision, Precision::Float32);
        assert_eq!(encoding.intensity.compression, Compression::NumpressSlof);
        assert_eq!(encoding.intensity.error_tolerance, Some(0.001));
        assert_eq!(encoding.mz.compression, Compression::None);
        assert_eq!(encoding.time, EncodingPolicy::lossless().time);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.recode.threads, None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_str("[recode]\nthreads = \"many\"").is_err());
    }
}
