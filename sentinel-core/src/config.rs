//! Flag engine configuration.
//!
//! Thresholds default to the documented values and can be overridden from
//! environment variables or by the binaries' own flags.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};
use crate::similarity::SimilarityKind;

/// Default minimum similarity for "same layout, different vendor".
pub const DEFAULT_SAME_LAYOUT_THRESHOLD: f64 = 0.85;

/// Default similarity below which a vendor's invoices count as inconsistent.
pub const DEFAULT_DIFFERENT_LAYOUT_THRESHOLD: f64 = 0.50;

/// Default Jaro–Winkler cutoff when fuzzy vendor matching is enabled.
pub const DEFAULT_VENDOR_FUZZY_THRESHOLD: f64 = 0.92;

/// How two vendor names are decided to belong to the same vendor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum VendorMatching {
    /// Trimmed, case-insensitive equality.
    #[default]
    Exact,
    /// Exact match, or Jaro–Winkler similarity of the alphanumeric forms at or
    /// above `threshold`.
    Fuzzy { threshold: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub same_layout_threshold: f64,
    pub different_layout_threshold: f64,
    pub vendor_matching: VendorMatching,
    pub similarity: SimilarityKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            same_layout_threshold: DEFAULT_SAME_LAYOUT_THRESHOLD,
            different_layout_threshold: DEFAULT_DIFFERENT_LAYOUT_THRESHOLD,
            vendor_matching: VendorMatching::Exact,
            similarity: SimilarityKind::Dice,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional: `SENTINEL_SAME_LAYOUT_THRESHOLD`,
    /// `SENTINEL_DIFFERENT_LAYOUT_THRESHOLD`, `SENTINEL_VENDOR_FUZZY_THRESHOLD`
    /// (enables fuzzy vendor matching), `SENTINEL_SIMILARITY`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_f64("SENTINEL_SAME_LAYOUT_THRESHOLD")? {
            config.same_layout_threshold = v;
        }
        if let Some(v) = env_f64("SENTINEL_DIFFERENT_LAYOUT_THRESHOLD")? {
            config.different_layout_threshold = v;
        }
        if let Some(v) = env_f64("SENTINEL_VENDOR_FUZZY_THRESHOLD")? {
            config.vendor_matching = VendorMatching::Fuzzy { threshold: v };
        }
        if let Ok(kind) = std::env::var("SENTINEL_SIMILARITY") {
            config.similarity = kind.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds outside `[0, 1]` or an inverted threshold pair.
    pub fn validate(&self) -> Result<()> {
        check_unit("same_layout_threshold", self.same_layout_threshold)?;
        check_unit("different_layout_threshold", self.different_layout_threshold)?;
        if self.different_layout_threshold > self.same_layout_threshold {
            return Err(SentinelError::InvalidConfig(format!(
                "different_layout_threshold ({}) must not exceed same_layout_threshold ({})",
                self.different_layout_threshold, self.same_layout_threshold
            )));
        }
        if let VendorMatching::Fuzzy { threshold } = self.vendor_matching {
            check_unit("vendor fuzzy threshold", threshold)?;
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SentinelError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SentinelError::InvalidConfig(format!("{key} is not a number: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.same_layout_threshold, 0.85);
        assert_eq!(config.different_layout_threshold, 0.50);
        assert_eq!(config.vendor_matching, VendorMatching::Exact);
        assert_eq!(config.similarity, SimilarityKind::Dice);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = EngineConfig {
            same_layout_threshold: 1.2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SentinelError::InvalidConfig(_))
        ));

        let config = EngineConfig {
            different_layout_threshold: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = EngineConfig {
            same_layout_threshold: 0.4,
            different_layout_threshold: 0.6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_fuzzy_threshold() {
        let config = EngineConfig {
            vendor_matching: VendorMatching::Fuzzy { threshold: 2.0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"same_layout_threshold": 0.9}"#).unwrap();
        assert_eq!(config.same_layout_threshold, 0.9);
        assert_eq!(config.different_layout_threshold, 0.5);
    }
}
