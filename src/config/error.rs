//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::TrustOrderError;

/// Errors raised while loading or validating [`super::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid config value for `merge.trust_order`: {0}")]
    TrustOrder(#[from] TrustOrderError),

    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}\n  Suggestion: check the TOML syntax and section names", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: &'static str,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message_names_field_and_range() {
        let err = ConfigError::out_of_range("concurrency.author_workers", 0, "1..=64");
        assert_eq!(
            err.to_string(),
            "Invalid config value for `concurrency.author_workers`: 0. Expected range: 1..=64"
        );
    }
}
