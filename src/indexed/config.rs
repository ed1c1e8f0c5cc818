//! Session configuration

use serde::{Deserialize, Serialize};

use crate::input::DEFAULT_INPUT_BUFFER_SIZE;
use crate::model::EncodingPolicy;

/// What to do when a single record cannot be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the session on the first failure
    #[default]
    FailFast,
    /// Log the failure, leave the record out and go on
    SkipAndContinue,
}

/// Configuration of an [`IndexedMzMLWriter`](super::IndexedMzMLWriter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Precision and compression per array type
    pub encoding: EncodingPolicy,

    /// Handling of records that fail to render
    pub failure_policy: FailurePolicy,

    /// Worker threads for rendering batches; 0 or 1 renders inline
    pub threads: usize,

    /// Records rendered together by `write_spectra`/`write_chromatograms`
    pub batch_size: usize,

    /// Wrap the document in `<indexedmzML>` and append the offset index
    pub write_index: bool,

    /// Close an indexed document with a SHA-1 `<fileChecksum>`
    pub write_checksum: bool,

    /// Progress is logged (and the callback consulted) every this many records
    pub progress_interval: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingPolicy::lossless(),
            failure_policy: FailurePolicy::FailFast,
            threads: 1,
            batch_size: 100,
            write_index: true,
            write_checksum: true,
            progress_interval: 1000,
        }
    }
}

impl WriterConfig {
    /// 64-bit zlib for every array
    pub fn lossless() -> Self {
        Self::default()
    }

    /// 32-bit intensities, otherwise lossless
    pub fn compact() -> Self {
        Self {
            encoding: EncodingPolicy::compact(),
            ..Self::default()
        }
    }

    /// Numpress with error tolerances and zlib fallback
    pub fn numpress() -> Self {
        Self {
            encoding: EncodingPolicy::numpress(),
            ..Self::default()
        }
    }

    /// Preset by name: `lossless`, `compact` or `numpress`
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "lossless" => Some(Self::lossless()),
            "compact" => Some(Self::compact()),
            "numpress" => Some(Self::numpress()),
            _ => None,
        }
    }

    /// Set the number of rendering threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Configuration of the readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Handling of records that fail to convert
    pub failure_policy: FailurePolicy,

    /// Bytes read from the end of the file when looking for `<indexListOffset>`
    pub tail_window: usize,

    /// Buffer size for stream reads
    pub buffer_size: usize,

    /// Check the stored `<fileChecksum>`, when present, as part of `verify`
    pub verify_checksum: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::FailFast,
            tail_window: 4096,
            buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            verify_checksum: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::Compression;

    #[test]
    fn test_presets() {
        assert_eq!(WriterConfig::preset("lossless"), Some(WriterConfig::default()));
        let numpress = WriterConfig::preset("numpress").unwrap();
        assert_eq!(numpress.encoding.mz.compression, Compression::NumpressLinearZlib);
        assert!(WriterConfig::preset("fastest").is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: WriterConfig = toml::from_str(
            r#"
            threads = 4
            failure_policy = "skip-and-continue"

            [encoding.intensity]
            precision = "float32"
            compression = "none"
            "#,
        )
        .unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.failure_policy, FailurePolicy::SkipAndContinue);
        assert_eq!(config.encoding.intensity.compression, Compression::None);
        assert_eq!(config.encoding.mz, WriterConfig::default().encoding.mz);
        assert!(config.write_index);
        assert!(config.write_checksum);
    }
}
