//! Engine tunables.
//!
//! Every constant the engine relies on lives here so hosts can override it
//! from JSON. Missing fields fall back to the defaults below.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::decision::StaticTable;
use crate::error::{SuitcastResult, ValidationError};
use crate::rules::MiningPolicy;

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// History entries older than `latest_round - retention_rounds` are dropped.
    pub retention_rounds: u64,
    /// Distance between a source round and the round it forecasts.
    pub forecast_horizon: u64,
    /// Minimum distance between the source rounds of two forecasts.
    pub round_spacing: u64,
    /// Minimum wall-clock gap between two forecasts.
    pub cooldown_secs: u32,
    /// Adaptive rules are re-mined once they are older than this.
    pub mining_interval_secs: u32,
    /// Largest offset at which a forecast can still be confirmed.
    pub verification_window: u64,
    /// Fewer correlation records than this mine to an empty rule set.
    pub min_samples: usize,
    /// Consecutive static losses that force adaptive mode on.
    pub static_failure_threshold: u32,
    /// How mined candidates are cut down to the active rule set.
    pub mining_policy: MiningPolicy,
    /// Fallback card-to-suit table.
    pub static_table: StaticTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_rounds: 50,
            forecast_horizon: 2,
            round_spacing: 3,
            cooldown_secs: 30,
            mining_interval_secs: 1800,
            verification_window: 2,
            min_samples: 3,
            static_failure_threshold: 2,
            mining_policy: MiningPolicy::default(),
            static_table: StaticTable::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document and validates the result.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the JSON is malformed or a field is out of range.
    pub fn from_json_str(json: &str) -> SuitcastResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| ValidationError::config("json", e.to_string()))?;
        Ok(cfg.validate()?)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` naming the offending field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.forecast_horizon == 0 {
            return Err(ValidationError::config("forecast_horizon", "must be at least 1"));
        }

        // The correlation lookback reads `round - forecast_horizon` from history.
        if self.retention_rounds < self.forecast_horizon {
            return Err(ValidationError::config(
                "retention_rounds",
                format!(
                    "must be at least forecast_horizon ({}), got {}",
                    self.forecast_horizon, self.retention_rounds
                ),
            ));
        }

        if self.round_spacing == 0 {
            return Err(ValidationError::config("round_spacing", "must be at least 1"));
        }

        if self.min_samples == 0 {
            return Err(ValidationError::config("min_samples", "must be at least 1"));
        }

        if self.static_failure_threshold == 0 {
            return Err(ValidationError::config(
                "static_failure_threshold",
                "must be at least 1",
            ));
        }

        self.mining_policy.validate()?;
        Ok(self)
    }

    pub(crate) fn cooldown(&self) -> Duration {
        Duration::seconds(i64::from(self.cooldown_secs))
    }

    pub(crate) fn mining_interval(&self) -> Duration {
        Duration::seconds(i64::from(self.mining_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = EngineConfig::default().validate().unwrap();
        assert_eq!(cfg.retention_rounds, 50);
        assert_eq!(cfg.round_spacing, 3);
        assert_eq!(cfg.cooldown(), Duration::seconds(30));
        assert_eq!(cfg.mining_interval(), Duration::seconds(1800));
    }

    #[test]
    fn test_rejects_zero_spacing() {
        let cfg = EngineConfig {
            round_spacing: 0,
            ..EngineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("round_spacing"));
    }

    #[test]
    fn test_rejects_retention_shorter_than_horizon() {
        let cfg = EngineConfig {
            retention_rounds: 1,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_overrides_only_given_fields() {
        let cfg = EngineConfig::from_json_str(r#"{"cooldown_secs": 0, "min_samples": 5}"#).unwrap();
        assert_eq!(cfg.cooldown_secs, 0);
        assert_eq!(cfg.min_samples, 5);
        assert_eq!(cfg.verification_window, 2);
        assert_eq!(cfg.static_table, StaticTable::default());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_from_json_policy() {
        let cfg = EngineConfig::from_json_str(
            r#"{"mining_policy": {"type": "per_trigger_suit", "per_suit": 2}}"#,
        )
        .unwrap();
        assert_eq!(cfg.mining_policy, MiningPolicy::PerTriggerSuit { per_suit: 2 });
    }
}
