//! Encoding profiles for `recode`.
//!
//! Profiles name the writer presets so users never have to spell out
//! precision and compression per array type.

use std::fmt;
use std::str::FromStr;

use mzcodec::indexed::WriterConfig;

/// Encoding profiles for common use cases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    /// 64-bit zlib for every array (default).
    #[default]
    Lossless,

    /// 32-bit intensities, everything else 64-bit, all zlib.
    Compact,

    /// MS-Numpress with zlib, checked against error tolerances.
    ///
    /// - m/z and time: linear prediction, relative tolerance 2e-9
    /// - intensity: short logged float, relative tolerance 2e-4
    Numpress,
}

impl Profile {
    /// Writer configuration for this profile.
    pub fn writer_config(&self) -> WriterConfig {
        match self {
            Profile::Lossless => WriterConfig::lossless(),
            Profile::Compact => WriterConfig::compact(),
            Profile::Numpress => WriterConfig::numpress(),
        }
    }

    /// Returns all available profile names.
    pub fn variants() -> &'static [&'static str] {
        &["lossless", "compact", "numpress"]
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Lossless => write!(f, "lossless"),
            Profile::Compact => write!(f, "compact"),
            Profile::Numpress => write!(f, "numpress"),
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lossless" | "default" => Ok(Profile::Lossless),
            "compact" => Ok(Profile::Compact),
            "numpress" => Ok(Profile::Numpress),
            _ => Err(format!(
                "Unknown profile '{}'. Valid options: {}",
                s,
                Profile::variants().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mzcodec::binary::{Compression, Precision};

    #[test]
    fn test_profile_defaults() {
        let lossless = Profile::default();
        assert_eq!(lossless, Profile::Lossless);
        assert_eq!(lossless.writer_config(), WriterConfig::default());
        assert_eq!(
            Profile::Compact.writer_config().encoding.intensity.precision,
            Precision::Float32
        );
        assert_eq!(
            Profile::Numpress.writer_config().encoding.intensity.compression,
            Compression::NumpressSlofZlib
        );
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!(Profile::from_str("compact").unwrap(), Profile::Compact);
        assert_eq!(Profile::from_str("NUMPRESS").unwrap(), Profile::Numpress);
        assert_eq!(Profile::from_str("default").unwrap(), Profile::Lossless);
        assert!(Profile::from_str("fast").is_err());
    }
}
