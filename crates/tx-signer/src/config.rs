use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{FeePolicy, Result, SignerError};

/// Where the KZG trusted setup comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TrustedSetupSource {
    /// The mainnet ceremony output bundled with the KZG library
    #[default]
    Ethereum,
    /// A trusted setup file in the standard text format
    File {
        /// Path of the file
        path: PathBuf,
    },
}

/// KZG settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KzgConfig {
    /// Trusted setup to load
    pub trusted_setup: TrustedSetupSource,
}

/// Signer configuration. Every section is optional and falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignerConfig {
    /// Fee policy
    pub fee: FeePolicy,
    /// KZG settings
    pub kzg: KzgConfig,
}

impl SignerConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.fee.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| SignerError::ConfigRead { path: path.to_path_buf(), source })?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), ?config, "Loaded signer config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SignerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SignerConfig::default());
        assert_eq!(config.fee.headroom_numerator, 112);
        assert_eq!(config.kzg.trusted_setup, TrustedSetupSource::Ethereum);
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "fee": { "headroomNumerator": 125, "headroomDenominator": 100 },
            "kzg": { "trustedSetup": { "kind": "file", "path": "/etc/kzg/trusted_setup.txt" } }
        }"#;
        let config = SignerConfig::from_json_str(json).unwrap();

        assert_eq!(config.fee.headroom_numerator, 125);
        assert_eq!(
            config.kzg.trusted_setup,
            TrustedSetupSource::File { path: "/etc/kzg/trusted_setup.txt".into() }
        );
    }

    #[test]
    fn test_invalid_config() {
        let err =
            SignerConfig::from_json_str(r#"{"fee": {"headroomDenominator": 0}}"#).unwrap_err();
        assert!(matches!(err, SignerError::InvalidField { .. }));

        let err = SignerConfig::from_json_str("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = SignerConfig::load("/nonexistent/signer.json").unwrap_err();
        assert!(matches!(err, SignerError::ConfigRead { .. }));
    }
}
