//! Console configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Files are parsed first and validated second; a config that parses but
//! is inconsistent is rejected with [`ConfigError::Invalid`].

use crate::error::ConfigError;
use recon_kernel::ranking::RankingPolicy;
use recon_kernel::scoring::RiskBand;
use recon_kernel::store::StoreConfig;
use recon_kernel::validation::{ensure, ensure_finite, Validate};
use recon_kernel::ValidationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest config file `load` will read
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Top-level console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// How many ranked candidates a plan keeps
    pub top_candidates: usize,
    pub store: StoreConfig,
    pub ranking: RankingPolicy,
    pub policy: PolicyConfig,
}

impl ConsoleConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let meta = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if meta.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Io(format!(
                "{} exceeds {MAX_CONFIG_FILE_SIZE} bytes",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded console config");
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingPolicy) -> Self {
        self.ranking = ranking;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_top_candidates(mut self, top: usize) -> Self {
        self.top_candidates = top;
        self
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            top_candidates: 3,
            store: StoreConfig::default(),
            ranking: RankingPolicy::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Validate for ConsoleConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.store.validate().map_err(|e| e.nested("store"))?;
        validate_ranking(&self.ranking).map_err(|e| e.nested("ranking"))?;
        self.policy.validate().map_err(|e| e.nested("policy"))?;
        ensure(self.top_candidates > 0, "top_candidates", "must be positive")
    }
}

fn validate_ranking(policy: &RankingPolicy) -> Result<(), ValidationError> {
    let fields = [
        ("age_penalty_per_hour", policy.age_penalty_per_hour),
        ("max_age_penalty", policy.max_age_penalty),
        ("duration_penalty_per_minute", policy.duration_penalty_per_minute),
        ("max_duration_penalty", policy.max_duration_penalty),
    ];
    for (field, value) in fields {
        ensure_finite(value, field)?;
        ensure(value >= 0.0, field, "must not be negative")?;
    }
    Ok(())
}

/// Gates a plan must pass before any step runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Highest risk band a run may proceed at
    pub max_risk_band: RiskBand,
    /// Lowest acceptable candidate confidence, 0-100
    pub min_confidence: f64,
    /// Longest acceptable estimated duration
    pub max_duration_minutes: Option<u32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_risk_band: RiskBand::High,
            min_confidence: 20.0,
            max_duration_minutes: None,
        }
    }
}

impl Validate for PolicyConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure_finite(self.min_confidence, "min_confidence")?;
        ensure(
            (0.0..=100.0).contains(&self.min_confidence),
            "min_confidence",
            "must be within 0-100",
        )?;
        ensure(
            self.max_duration_minutes != Some(0),
            "max_duration_minutes",
            "must be positive when set",
        )
    }
}
