//! Engine configuration.
//!
//! Every detector threshold lives in a dedicated section so a deployment
//! can tighten or relax individual patterns without touching code.
//! Supports programmatic construction, file-based configuration
//! (TOML/JSON), and validation.

use crate::error::{EngineError, Result};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cycle detector thresholds.
    pub cycle: CycleConfig,
    /// Smurfing detector thresholds.
    pub smurfing: SmurfingConfig,
    /// Shell chain detector thresholds.
    pub shell: ShellConfig,
    /// Velocity detector thresholds.
    pub velocity: VelocityConfig,
    /// Structuring detector thresholds.
    pub structuring: StructuringConfig,
    /// Anomaly model parameters.
    pub anomaly: AnomalyConfig,
    /// Score composition weights and suppression thresholds.
    pub scoring: ScoringConfig,
    /// Logging setup.
    pub log: LogConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML or JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("cannot read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let config: Self = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| EngineError::config(format!("JSON parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| EngineError::config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(EngineError::config(format!(
                    "unsupported config format: {other}"
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.cycle.min_length < 3 {
            return Err(EngineError::config("cycle.min_length must be >= 3"));
        }
        if self.cycle.max_length < self.cycle.min_length || self.cycle.max_length > 5 {
            return Err(EngineError::config(
                "cycle.max_length must be within [min_length, 5]",
            ));
        }
        if self.cycle.ops_per_node == 0 || self.cycle.max_cycles == 0 {
            return Err(EngineError::config("cycle budgets must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.cycle.flow_ratio_min) {
            return Err(EngineError::config("cycle.flow_ratio_min must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.shell.passthrough_ratio) {
            return Err(EngineError::config(
                "shell.passthrough_ratio must be in [0, 1]",
            ));
        }
        if self.smurfing.min_fan_in < 2 || self.smurfing.min_disperser_out < 2 {
            return Err(EngineError::config("smurfing fan thresholds must be >= 2"));
        }
        if self.anomaly.trees == 0 || self.anomaly.sample_size == 0 {
            return Err(EngineError::config("anomaly model needs trees and samples"));
        }
        if self.scoring.base_cap <= 0.0 {
            return Err(EngineError::config("scoring.base_cap must be > 0"));
        }
        Ok(())
    }
}

/// Cycle detector configuration (lengths 3..=5, bounded DFS).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum cycle length.
    pub min_length: usize,
    /// Maximum cycle length.
    pub max_length: usize,
    /// Minimum total degree for DFS eligibility (excludes isolated nodes).
    pub min_degree: usize,
    /// Maximum total degree for DFS eligibility (excludes hubs).
    pub max_degree: usize,
    /// DFS step budget per start node.
    pub ops_per_node: u64,
    /// Global cap on validated cycles per batch.
    pub max_cycles: usize,
    /// Temporal window over the cycle's edges, in hours.
    pub window_hours: i64,
    /// Per-edge amount tolerance around the cycle mean.
    pub amount_tolerance: f64,
    /// Flow conservation floor: min(amounts) / max(amounts).
    pub flow_ratio_min: f64,
    /// Maximum distinct non-cycle neighbors active inside the window.
    pub max_external_neighbors: usize,
    /// Maximum ring members before union-find refuses further merges.
    pub max_ring_size: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 5,
            min_degree: 2,
            max_degree: 20,
            ops_per_node: 5_000,
            max_cycles: 2_000,
            window_hours: 72,
            amount_tolerance: 0.15,
            flow_ratio_min: 0.70,
            max_external_neighbors: 5,
            max_ring_size: 30,
        }
    }
}

/// Smurfing detector configuration (aggregator + disperser scans).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmurfingConfig {
    /// Sliding window length in hours.
    pub window_hours: i64,
    /// Minimum inbound edges for an aggregator window.
    pub min_fan_in: usize,
    /// Maximum coefficient of variation of window amounts.
    pub max_cv: f64,
    /// Minimum outbound edges required after an aggregator window.
    pub min_outbound: usize,
    /// Grace period after the window close for outbound edges, in hours.
    pub outbound_grace_hours: i64,
    /// Maximum retention ratio: 1 - (outbound sum / inbound window sum).
    pub max_retention: f64,
    /// Maximum mean holding time between receipt and forwarding, in hours.
    pub max_mean_holding_hours: f64,
    /// Minimum outbound edges for a disperser window.
    pub min_disperser_out: usize,
    /// Maximum distinct inbound counterparties funding a disperser.
    pub max_funding_sources: usize,
    /// Funding-phase lookback before the disperser window, in hours.
    pub funding_lookback_hours: i64,
}

impl Default for SmurfingConfig {
    fn default() -> Self {
        Self {
            window_hours: 72,
            min_fan_in: 10,
            max_cv: 0.40,
            min_outbound: 5,
            outbound_grace_hours: 48,
            max_retention: 0.50,
            max_mean_holding_hours: 30.0,
            min_disperser_out: 10,
            max_funding_sources: 2,
            funding_lookback_hours: 72,
        }
    }
}

/// Shell chain detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Minimum total degree for a passthrough candidate.
    pub min_degree: usize,
    /// Maximum total degree for a passthrough candidate.
    pub max_degree: usize,
    /// Fraction of inbound value that must be forwarded.
    pub passthrough_ratio: f64,
    /// Forwarding window after receipt, in hours.
    pub forward_window_hours: i64,
    /// Maximum candidate lifetime as a fraction of the batch span.
    pub max_lifetime_ratio: f64,
    /// Minimum intermediate candidates for a valid chain.
    pub min_intermediaries: usize,
    /// Maximum chain length including both endpoints.
    pub max_chain_length: usize,
    /// Global BFS step budget across all chain walks.
    pub step_budget: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            min_degree: 2,
            max_degree: 3,
            passthrough_ratio: 0.80,
            forward_window_hours: 24,
            max_lifetime_ratio: 0.30,
            min_intermediaries: 2,
            max_chain_length: 7,
            step_budget: 100_000,
        }
    }
}

/// Velocity detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Maximum gap between receipt and forwarding, in hours.
    pub window_hours: i64,
    /// Minimum outbound amount as a fraction of the inbound amount.
    pub min_amount_ratio: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window_hours: 1,
            min_amount_ratio: 0.50,
        }
    }
}

/// Structuring detector configuration (sub-threshold banded deposits).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuringConfig {
    /// Near-threshold amount bands, inclusive.
    pub bands: Vec<(f64, f64)>,
    /// Minimum banded transactions inside one window.
    pub min_hits: usize,
    /// Window length in hours.
    pub window_hours: i64,
    /// Minimum qualifying windows, separated by at least one window length.
    pub min_windows: usize,
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            bands: vec![(8_000.0, 9_999.0), (4_000.0, 4_999.0)],
            min_hits: 5,
            window_hours: 48,
            min_windows: 2,
        }
    }
}

/// Anomaly model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Number of isolation trees.
    pub trees: usize,
    /// Subsample size per tree.
    pub sample_size: usize,
    /// RNG seed; fixed per batch for reproducible output.
    pub seed: u64,
    /// Upper bound of the normalized anomaly bonus.
    pub max_bonus: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            sample_size: 256,
            seed: 42,
            max_bonus: 15.0,
        }
    }
}

/// Score composition weights and suppression thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Cap on the summed base pattern score.
    pub base_cap: f64,
    /// Merchant penalty magnitude.
    pub merchant_penalty: f64,
    /// Top-counterparty repeat ratio floor for the merchant penalty.
    pub merchant_repeat_ratio: f64,
    /// Inter-arrival timing CV ceiling for the merchant penalty.
    pub merchant_timing_cv: f64,
    /// Minimum edges before the merchant penalty applies at all.
    pub merchant_min_edges: usize,
    /// Activity suppression penalty magnitude.
    pub activity_penalty: f64,
    /// Degree floor for activity suppression.
    pub activity_min_degree: usize,
    /// Active-span over batch-span floor for activity suppression.
    pub activity_span_ratio: f64,
    /// Amount CV floor for activity suppression.
    pub activity_min_cv: f64,
    /// Inactivity gap (fraction of active span) that disables suppression.
    pub activity_gap_ratio: f64,
    /// Cluster booster bonus.
    pub booster_bonus: f64,
    /// Neighbor score a booster neighbor must exceed.
    pub booster_neighbor_score: f64,
    /// Minimum qualifying neighbors for the booster.
    pub booster_min_neighbors: usize,
    /// Minimum score for a pattern-less, cluster-boosted account to appear.
    pub flag_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_cap: 70.0,
            merchant_penalty: 20.0,
            merchant_repeat_ratio: 0.30,
            merchant_timing_cv: 1.5,
            merchant_min_edges: 10,
            activity_penalty: 50.0,
            activity_min_degree: 50,
            activity_span_ratio: 0.70,
            activity_min_cv: 0.5,
            activity_gap_ratio: 0.20,
            booster_bonus: 8.0,
            booster_neighbor_score: 30.0,
            booster_min_neighbors: 2,
            flag_threshold: 15.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle.max_length, 5);
        assert_eq!(config.cycle.ops_per_node, 5_000);
        assert_eq!(config.smurfing.min_fan_in, 10);
        assert_eq!(config.anomaly.seed, 42);
        assert!((config.scoring.base_cap - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validation_rejects_bad_cycle_bounds() {
        let mut config = EngineConfig::default();
        config.cycle.max_length = 9;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.cycle.min_length = 2;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.cycle.ops_per_node = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_ratios() {
        let mut config = EngineConfig::default();
        config.shell.passthrough_ratio = 1.2;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.cycle.flow_ratio_min = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.cycle.max_cycles, config.cycle.max_cycles);
        assert_eq!(back.structuring.bands.len(), 2);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let back: EngineConfig = toml::from_str("[cycle]\nmax_degree = 40\n").unwrap();
        assert_eq!(back.cycle.max_degree, 40);
        assert_eq!(back.cycle.ops_per_node, 5_000);
        assert_eq!(back.smurfing.min_fan_in, 10);
    }
}
