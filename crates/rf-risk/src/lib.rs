//! Composite risk scoring pipeline for Riskfold.
//!
//! Provides:
//! - Portfolio concentration (normalized HHI)
//! - Hope mispricing index and sentiment aggregation
//! - Chaotic risk scoring of provocation signals
//! - The integrator combining them into one auditable composite
//!
//! All engines are pure: they hold configuration only and perform no I/O.

pub mod chaotic;
pub mod concentration;
pub mod config;
pub mod integrator;
pub mod mispricing;

pub use chaotic::{normalized_entropy, ChaoticFlag, ChaoticRiskLayer, ChaoticRiskResult};
pub use concentration::{ConcentrationIndex, ConcentrationItem, ConcentrationResult};
pub use config::{ChaoticRiskConfig, CompositeWeights, RiskConfig, RiskThresholds, CONFIG_ENV_VAR};
pub use integrator::{
    CompositeRiskResult, ConcentrationFailure, ConcentrationOutcome, RiskIntegrator, RiskLevel,
    RiskRequest, SubScores,
};
pub use mispricing::{HopeResult, MispricingIndex, SentimentAggregate, HMI_CLIP};

/// Round to 6 decimal places for stable output.
pub(crate) fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}
