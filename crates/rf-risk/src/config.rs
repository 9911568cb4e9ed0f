//! Scoring configuration.
//!
//! Everything here is fixed once a [`RiskIntegrator`](crate::RiskIntegrator)
//! is built. Each section deserializes with defaults so a config file only
//! needs the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use rf_types::{config_error, DuplicatePolicy, RfResult};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "RISKFOLD_CONFIG";

/// Weights and dampening for the chaotic-risk layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaoticRiskConfig {
    /// Multiplier on intensity for institutional-like sources.
    pub w_institutional: f64,
    /// Multiplier on intensity for individual-like sources.
    pub w_individual: f64,
    /// Amplification per unit of vector coherence.
    pub w_vector_coherence: f64,
    /// Amplification per unit of average confidence.
    pub w_confidence: f64,
    /// Final scale applied before clamping.
    pub global_dampen: f64,
}

impl Default for ChaoticRiskConfig {
    fn default() -> Self {
        Self {
            w_institutional: 1.5,
            w_individual: 1.0,
            w_vector_coherence: 1.0,
            w_confidence: 1.0,
            global_dampen: 0.9,
        }
    }
}

impl ChaoticRiskConfig {
    pub fn validate(&self) -> RfResult<()> {
        let named = [
            ("w_institutional", self.w_institutional),
            ("w_individual", self.w_individual),
            ("w_vector_coherence", self.w_vector_coherence),
            ("w_confidence", self.w_confidence),
            ("global_dampen", self.global_dampen),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(config_error!("chaotic.{} must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Coefficients of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub concentration: f64,
    pub nur: f64,
    pub rsz: f64,
    pub cycles: f64,
    pub hope: f64,
    pub chaotic: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            concentration: 0.20,
            nur: 0.15,
            rsz: 0.10,
            cycles: 0.15,
            hope: 0.20,
            chaotic: 0.20,
        }
    }
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.concentration + self.nur + self.rsz + self.cycles + self.hope + self.chaotic
    }

    pub fn validate(&self) -> RfResult<()> {
        let named = [
            ("concentration", self.concentration),
            ("nur", self.nur),
            ("rsz", self.rsz),
            ("cycles", self.cycles),
            ("hope", self.hope),
            ("chaotic", self.chaotic),
        ];
        for (name, value) in named {
            // negative coefficients would break monotonicity of the composite
            if !value.is_finite() || value < 0.0 {
                return Err(config_error!("weights.{} must be a non-negative number, got {}", name, value));
            }
        }
        if self.sum() <= 0.0 {
            return Err(config_error!("composite weights must not all be zero"));
        }
        Ok(())
    }
}

/// Lower bounds (exclusive) of each risk level above STABLE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub watch: f64,
    pub elevated: f64,
    pub danger: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            watch: 0.2,
            elevated: 0.4,
            danger: 0.65,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> RfResult<()> {
        let ordered = 0.0 <= self.watch && self.watch <= self.elevated && self.elevated <= self.danger;
        if !(self.danger.is_finite() && ordered) {
            return Err(config_error!(
                "thresholds must satisfy 0 <= watch <= elevated <= danger, got {} / {} / {}",
                self.watch,
                self.elevated,
                self.danger
            ));
        }
        Ok(())
    }
}

/// Top-level scoring configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub chaotic: ChaoticRiskConfig,
    pub weights: CompositeWeights,
    pub thresholds: RiskThresholds,
    pub duplicate_isins: DuplicatePolicy,
}

impl RiskConfig {
    pub fn validate(&self) -> RfResult<()> {
        self.chaotic.validate()?;
        self.weights.validate()?;
        self.thresholds.validate()
    }

    pub fn from_json_str(json: &str) -> RfResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Load from the file named by [`CONFIG_ENV_VAR`], or defaults when unset.
    pub fn from_env() -> RfResult<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid_and_weights_sum_to_one() {
        let config = RiskConfig::default();
        config.validate().unwrap();
        assert!((config.weights.sum() - 1.0).abs() < 1e-12);
        assert_eq!(config.duplicate_isins, DuplicatePolicy::LastWins);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = RiskConfig::from_json_str(
            r#"{"chaotic": {"global_dampen": 0.5}, "duplicate_isins": "reject"}"#,
        )
        .unwrap();
        assert_eq!(config.chaotic.global_dampen, 0.5);
        assert_eq!(config.chaotic.w_institutional, 1.5);
        assert_eq!(config.weights, CompositeWeights::default());
        assert_eq!(config.duplicate_isins, DuplicatePolicy::Reject);
    }

    #[test]
    fn negative_weight_rejected() {
        let err = RiskConfig::from_json_str(r#"{"weights": {"hope": -0.1}}"#).unwrap_err();
        assert!(err.to_string().contains("weights.hope"));
    }

    #[test]
    fn unordered_thresholds_rejected() {
        let err = RiskConfig::from_json_str(r#"{"thresholds": {"watch": 0.5, "elevated": 0.3}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("thresholds"));
    }

    #[test]
    fn all_zero_weights_rejected() {
        let json = r#"{"weights": {"concentration": 0, "nur": 0, "rsz": 0, "cycles": 0, "hope": 0, "chaotic": 0}}"#;
        assert!(RiskConfig::from_json_str(json).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"thresholds": {{"danger": 0.8}}}}"#).unwrap();
        let config = RiskConfig::from_file(file.path()).unwrap();
        assert_eq!(config.thresholds.danger, 0.8);
        assert_eq!(config.thresholds.watch, 0.2);
    }

    #[test]
    fn config_serialization_roundtrip() {
        let config = RiskConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RiskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
