//! Matching and import configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Explicit path, or the override in the data dir
//!    (~/.local/share/tally/config/tally.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override file keep their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub resolver: ResolverConfig,
    pub matcher: MatcherConfig,
    pub import: ImportConfig,
    pub progress: ProgressConfig,
}

/// Account resolver thresholds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum similarity for a fuzzy match
    pub fuzzy_floor: u8,
    /// Fuzzy matches strictly above this are auto-mapped
    pub auto_accept_confidence: u8,
    pub max_similar: usize,
    pub max_ref_length: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_floor: 60,
            auto_accept_confidence: 90,
            max_similar: 5,
            max_ref_length: 120,
        }
    }
}

/// Amount tolerance tier, relative to the candidate amount
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AmountTier {
    pub percent: f64,
    pub points: u8,
}

/// Date distance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DateTier {
    pub days: i64,
    pub points: u8,
}

/// Bill/invoice scoring weights
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub min_score: u8,
    pub amount_tiers: Vec<AmountTier>,
    pub date_tiers: Vec<DateTier>,
    pub name_points: u8,
    pub name_cap: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_score: 40,
            amount_tiers: vec![
                AmountTier {
                    percent: 1.0,
                    points: 50,
                },
                AmountTier {
                    percent: 5.0,
                    points: 35,
                },
                AmountTier {
                    percent: 10.0,
                    points: 20,
                },
            ],
            date_tiers: vec![
                DateTier { days: 7, points: 30 },
                DateTier {
                    days: 14,
                    points: 20,
                },
                DateTier {
                    days: 30,
                    points: 10,
                },
            ],
            name_points: 20,
            name_cap: 30,
        }
    }
}

/// Import loop settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub contra_account_number: String,
    pub contra_account_name: String,
    pub new_account_number_start: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            contra_account_number: "9999".to_string(),
            contra_account_name: "Import Clearing".to_string(),
            new_account_number_start: 9000,
        }
    }
}

/// Progress tracker settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub final_snapshot_secs: u64,
    pub persist_every: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            final_snapshot_secs: 30,
            persist_every: 25,
        }
    }
}

impl TallyConfig {
    /// Load configuration (explicit path, then override location, then embedded default)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(default_path) => {
                    debug!(path = %default_path.display(), "Using config override");
                    fs::read_to_string(&default_path)
                        .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
                }
                None => DEFAULT_CONFIG.to_string(),
            },
        };

        Self::parse(&content)
    }

    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        let config: TallyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that thresholds are internally consistent
    pub fn validate(&self) -> Result<()> {
        let r = &self.resolver;
        if r.fuzzy_floor > r.auto_accept_confidence || r.auto_accept_confidence > 100 {
            return Err(Error::Config(format!(
                "resolver thresholds must satisfy fuzzy_floor ({}) <= auto_accept_confidence ({}) <= 100",
                r.fuzzy_floor, r.auto_accept_confidence
            )));
        }

        let m = &self.matcher;
        if m.min_score > 100 {
            return Err(Error::Config("matcher.min_score must be <= 100".into()));
        }
        if m.amount_tiers
            .windows(2)
            .any(|w| w[0].percent >= w[1].percent || w[0].points < w[1].points)
        {
            return Err(Error::Config(
                "matcher.amount_tiers must widen with non-increasing points".into(),
            ));
        }
        if m.date_tiers
            .windows(2)
            .any(|w| w[0].days >= w[1].days || w[0].points < w[1].points)
        {
            return Err(Error::Config(
                "matcher.date_tiers must widen with non-increasing points".into(),
            ));
        }

        if self.import.contra_account_number.trim().is_empty() {
            return Err(Error::Config(
                "import.contra_account_number must not be empty".into(),
            ));
        }
        if self.progress.persist_every == 0 {
            return Err(Error::Config("progress.persist_every must be >= 1".into()));
        }

        Ok(())
    }
}

/// Override location in the platform data directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("tally.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_default_matches_struct_defaults() {
        let parsed = TallyConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, TallyConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = TallyConfig::parse(
            r#"
            [resolver]
            fuzzy_floor = 75
            "#,
        )
        .unwrap();
        assert_eq!(config.resolver.fuzzy_floor, 75);
        assert_eq!(config.resolver.auto_accept_confidence, 90);
        assert_eq!(config.matcher, MatcherConfig::default());
    }

    #[test]
    fn test_rejects_floor_above_auto_accept() {
        let err = TallyConfig::parse(
            r#"
            [resolver]
            fuzzy_floor = 95
            auto_accept_confidence = 90
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_unordered_tiers() {
        let err = TallyConfig::parse(
            r#"
            [matcher]
            date_tiers = [{ days = 14, points = 20 }, { days = 7, points = 30 }]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[progress]\npersist_every = 5").unwrap();

        let config = TallyConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.progress.persist_every, 5);
        assert_eq!(config.progress.final_snapshot_secs, 30);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = TallyConfig::load(Some(Path::new("/nonexistent/tally.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
