//! Composite risk integration.
//!
//! [`RiskIntegrator`] runs every sub-index over one [`RiskRequest`], folds in
//! the three macro scalars and returns the full trace as a
//! [`CompositeRiskResult`], never just the final number.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use rf_types::{
    CycleSignal, Degradation, DegradationReason, MacroSignal, NurSignal, PortfolioHolding,
    ProvocationSignal, RawProvocation, RfResult, RszSignal, WeightMap,
};

use crate::chaotic::{ChaoticRiskLayer, ChaoticRiskResult};
use crate::concentration::{ConcentrationIndex, ConcentrationResult};
use crate::config::{CompositeWeights, RiskConfig, RiskThresholds};
use crate::mispricing::{HopeResult, MispricingIndex, SentimentAggregate};
use crate::round6;

/// Full scoring request, in wire field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskRequest {
    pub portfolio: Vec<PortfolioHolding>,
    #[serde(default)]
    pub nur: NurSignal,
    #[serde(default)]
    pub rsz: RszSignal,
    #[serde(default)]
    pub cycles: CycleSignal,
    #[serde(default)]
    pub market_expectation: Option<f64>,
    #[serde(default)]
    pub objective_prob: Option<f64>,
    #[serde(default)]
    pub sentiments: Option<Vec<f64>>,
    #[serde(default)]
    pub provocations: Option<Vec<RawProvocation>>,
}

/// Ordinal bucket of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Stable,
    Watch,
    Elevated,
    Danger,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Stable => "STABLE",
            RiskLevel::Watch => "WATCH",
            RiskLevel::Elevated => "ELEVATED",
            RiskLevel::Danger => "DANGER",
        };
        write!(f, "{}", s)
    }
}

/// Concentration failure as reported in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationFailure {
    pub error: String,
    /// Always `None`; kept so consumers reading `portfolio_hhi.hhi` see null.
    pub hhi: Option<f64>,
}

/// Concentration sub-result: either the index or the validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConcentrationOutcome {
    Computed(ConcentrationResult),
    Failed(ConcentrationFailure),
}

impl ConcentrationOutcome {
    pub fn normalized(&self) -> f64 {
        match self {
            ConcentrationOutcome::Computed(r) => r.hhi_normalized,
            ConcentrationOutcome::Failed(_) => 0.0,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConcentrationOutcome::Computed(_) => None,
            ConcentrationOutcome::Failed(f) => Some(&f.error),
        }
    }
}

/// The six inputs of the weighted combination, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub concentration: f64,
    pub nur: f64,
    pub rsz: f64,
    pub cycles: f64,
    pub hope: f64,
    pub chaotic: f64,
}

impl SubScores {
    pub fn uniform(v: f64) -> Self {
        Self {
            concentration: v,
            nur: v,
            rsz: v,
            cycles: v,
            hope: v,
            chaotic: v,
        }
    }
}

/// Everything computed for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRiskResult {
    pub portfolio_hhi: ConcentrationOutcome,
    pub hope: HopeResult,
    pub sentiment_agg: SentimentAggregate,
    pub nur: NurSignal,
    pub rsz: RszSignal,
    pub cycles: CycleSignal,
    pub provocations: Vec<RawProvocation>,
    pub chaotic_risk: ChaoticRiskResult,
    pub composite: f64,
    pub risk_level: RiskLevel,
    pub sub_scores: SubScores,
    /// Inputs that were replaced by neutral defaults.
    pub degradations: Vec<Degradation>,
}

/// Read a macro signal's headline scalar into [0, 1], recording degradation.
fn headline_score<S: MacroSignal>(signal: &S, trail: &mut Vec<Degradation>) -> f64 {
    let resolved = signal.headline().clamped_unit();
    trail.extend(resolved.degradation(S::SOURCE, S::HEADLINE_FIELD));
    resolved.value
}

/// Composite risk integrator. Immutable after construction and safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct RiskIntegrator {
    config: RiskConfig,
    chaotic: ChaoticRiskLayer,
}

impl Default for RiskIntegrator {
    fn default() -> Self {
        let config = RiskConfig::default();
        Self {
            chaotic: ChaoticRiskLayer::new(config.chaotic.clone()),
            config,
        }
    }
}

impl RiskIntegrator {
    pub fn new(config: RiskConfig) -> RfResult<Self> {
        config.validate()?;
        Ok(Self {
            chaotic: ChaoticRiskLayer::new(config.chaotic.clone()),
            config,
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn chaotic_layer(&self) -> &ChaoticRiskLayer {
        &self.chaotic
    }

    pub fn integrate(&self, request: &RiskRequest) -> CompositeRiskResult {
        let mut trail: Vec<Degradation> = Vec::new();

        // 1) concentration
        let portfolio_hhi = match self.concentration(&request.portfolio, &mut trail) {
            Ok(r) => ConcentrationOutcome::Computed(r),
            Err(e) => {
                warn!(error = %e, "concentration index unavailable");
                ConcentrationOutcome::Failed(ConcentrationFailure {
                    error: e.to_string(),
                    hhi: None,
                })
            }
        };

        // 2) mispricing, only with both market inputs
        let hope = match (request.market_expectation, request.objective_prob) {
            (Some(expectation), Some(objective)) => MispricingIndex::compute_hmi(expectation, Some(objective)),
            _ => HopeResult::absent(),
        };

        // 3) sentiment
        let sentiment_agg =
            MispricingIndex::aggregate_sentiment(request.sentiments.as_deref().unwrap_or_default());

        // 4) macro scalars
        let nur_score = headline_score(&request.nur, &mut trail);
        let rsz_score = headline_score(&request.rsz, &mut trail);
        let cycles_score = headline_score(&request.cycles, &mut trail);

        // 5) chaotic risk
        let raw_provocations = request.provocations.clone().unwrap_or_default();
        let signals: Vec<ProvocationSignal> = raw_provocations
            .iter()
            .enumerate()
            .map(|(i, raw)| ProvocationSignal::from_raw(raw, &format!("provocations[{i}]"), &mut trail))
            .collect();
        let chaotic_risk = self
            .chaotic
            .compute_traced(&signals, &request.nur, &request.rsz, &mut trail);

        // 6) combination
        let sub_scores = SubScores {
            concentration: portfolio_hhi.normalized(),
            nur: nur_score,
            rsz: rsz_score,
            cycles: cycles_score,
            hope: hope.hmi_normalized,
            chaotic: chaotic_risk.cr_scalar,
        };
        let composite = self.composite(&sub_scores);
        let risk_level = self.classify(composite);

        // nur/rsz fields can be read both for the headline and by the chaotic layer
        let mut seen: HashSet<Degradation> = HashSet::with_capacity(trail.len());
        trail.retain(|d| seen.insert(d.clone()));

        if !trail.is_empty() {
            let fields: Vec<String> = trail.iter().map(ToString::to_string).collect();
            warn!(count = trail.len(), fields = %fields.join(", "), "inputs degraded to neutral defaults");
        }
        debug!(composite, %risk_level, "composite risk computed");

        CompositeRiskResult {
            portfolio_hhi,
            hope,
            sentiment_agg,
            nur: request.nur.clone(),
            rsz: request.rsz.clone(),
            cycles: request.cycles.clone(),
            provocations: raw_provocations,
            chaotic_risk,
            composite,
            risk_level,
            sub_scores,
            degradations: trail,
        }
    }

    fn concentration(
        &self,
        portfolio: &[PortfolioHolding],
        trail: &mut Vec<Degradation>,
    ) -> RfResult<ConcentrationResult> {
        let (weights, duplicates) = WeightMap::from_holdings(portfolio, self.config.duplicate_isins)?;
        for isin in duplicates {
            trail.push(Degradation::new(
                format!("portfolio[{isin}]"),
                "weight",
                DegradationReason::Duplicate,
            ));
        }
        ConcentrationIndex::compute(&weights)
    }

    /// Weighted combination of the sub-scores, rounded to 6 places.
    pub fn composite(&self, scores: &SubScores) -> f64 {
        let CompositeWeights {
            concentration,
            nur,
            rsz,
            cycles,
            hope,
            chaotic,
        } = self.config.weights;
        round6(
            concentration * scores.concentration
                + nur * scores.nur
                + rsz * scores.rsz
                + cycles * scores.cycles
                + hope * scores.hope
                + chaotic * scores.chaotic,
        )
    }

    pub fn classify(&self, composite: f64) -> RiskLevel {
        let RiskThresholds { watch, elevated, danger } = self.config.thresholds;
        if composite > danger {
            RiskLevel::Danger
        } else if composite > elevated {
            RiskLevel::Elevated
        } else if composite > watch {
            RiskLevel::Watch
        } else {
            RiskLevel::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_types::DuplicatePolicy;
    use serde_json::json;

    fn request(v: serde_json::Value) -> RiskRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn all_zero_sub_scores_are_stable() {
        let integrator = RiskIntegrator::default();
        let c = integrator.composite(&SubScores::uniform(0.0));
        assert_eq!(c, 0.0);
        assert_eq!(integrator.classify(c), RiskLevel::Stable);
    }

    #[test]
    fn all_one_sub_scores_are_danger() {
        let integrator = RiskIntegrator::default();
        let c = integrator.composite(&SubScores::uniform(1.0));
        assert_eq!(c, 1.0);
        assert_eq!(integrator.classify(c), RiskLevel::Danger);
    }

    #[test]
    fn thresholds_are_exclusive() {
        let integrator = RiskIntegrator::default();
        assert_eq!(integrator.classify(0.2), RiskLevel::Stable);
        assert_eq!(integrator.classify(0.200001), RiskLevel::Watch);
        assert_eq!(integrator.classify(0.4), RiskLevel::Watch);
        assert_eq!(integrator.classify(0.41), RiskLevel::Elevated);
        assert_eq!(integrator.classify(0.65), RiskLevel::Elevated);
        assert_eq!(integrator.classify(0.66), RiskLevel::Danger);
    }

    #[test]
    fn composite_is_monotone_in_each_sub_score() {
        let integrator = RiskIntegrator::default();
        let base = SubScores {
            concentration: 0.3,
            nur: 0.1,
            rsz: 0.5,
            cycles: 0.2,
            hope: 0.4,
            chaotic: 0.6,
        };
        let setters: [fn(&mut SubScores, f64); 6] = [
            |s, v| s.concentration = v,
            |s, v| s.nur = v,
            |s, v| s.rsz = v,
            |s, v| s.cycles = v,
            |s, v| s.hope = v,
            |s, v| s.chaotic = v,
        ];
        for set in setters {
            let mut prev = f64::NEG_INFINITY;
            for step in 0..=10 {
                let mut scores = base;
                set(&mut scores, step as f64 / 10.0);
                let c = integrator.composite(&scores);
                assert!(c >= prev);
                prev = c;
            }
        }
    }

    #[test]
    fn minimal_request_uses_neutral_defaults() {
        let r = RiskIntegrator::default().integrate(&request(json!({
            "portfolio": [{"isin": "A", "weight": 50}, {"isin": "B", "weight": 50}],
            "nur": {}, "rsz": {}, "cycles": {}
        })));
        assert_eq!(r.portfolio_hhi.normalized(), 0.0);
        assert_eq!(r.hope, HopeResult::absent());
        assert_eq!(r.sentiment_agg.count, 0);
        assert_eq!(r.chaotic_risk.cr_scalar, 0.0);
        assert_eq!(r.composite, 0.0);
        assert_eq!(r.risk_level, RiskLevel::Stable);
        // three missing headline fields
        assert_eq!(r.degradations.len(), 3);
        assert!(r
            .degradations
            .iter()
            .all(|d| d.reason == DegradationReason::Missing));
    }

    #[test]
    fn hope_requires_both_market_inputs() {
        let integrator = RiskIntegrator::default();
        let only_one = integrator.integrate(&request(json!({
            "portfolio": [{"isin": "A", "weight": 1}],
            "market_expectation": 0.9
        })));
        assert_eq!(only_one.hope, HopeResult::absent());

        let bad_objective = integrator.integrate(&request(json!({
            "portfolio": [{"isin": "A", "weight": 1}],
            "market_expectation": 0.9,
            "objective_prob": 0
        })));
        assert!(bad_objective.hope.is_error());
        assert_eq!(bad_objective.sub_scores.hope, 0.0);
    }

    #[test]
    fn empty_portfolio_degrades_instead_of_failing() {
        let r = RiskIntegrator::default().integrate(&request(json!({
            "portfolio": [],
            "nur": {"severity_score": 1.0}
        })));
        assert_eq!(r.portfolio_hhi.error(), Some("No weights provided"));
        assert_eq!(r.sub_scores.concentration, 0.0);
        assert_eq!(r.composite, 0.15);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["portfolio_hhi"]["hhi"].is_null());
    }

    #[test]
    fn macro_scalars_are_clamped_and_recorded() {
        let r = RiskIntegrator::default().integrate(&request(json!({
            "portfolio": [{"isin": "A", "weight": 1}],
            "nur": {"severity_score": 4},
            "rsz": {"action_weight": "n/a"},
            "cycles": {"cycle_pressure": 0.5}
        })));
        assert_eq!(r.sub_scores.nur, 1.0);
        assert_eq!(r.sub_scores.rsz, 0.0);
        assert_eq!(r.sub_scores.cycles, 0.5);
        assert!(r.degradations.contains(&Degradation::new(
            "nur",
            "severity_score",
            DegradationReason::OutOfRange
        )));
        assert!(r.degradations.contains(&Degradation::new(
            "rsz",
            "action_weight",
            DegradationReason::NotNumeric
        )));
    }

    #[test]
    fn shared_macro_fields_are_recorded_once() {
        let r = RiskIntegrator::default().integrate(&request(json!({
            "portfolio": [{"isin": "A", "weight": 1}],
            "nur": {"severity_score": "extreme"},
            "provocations": [{"intensity": 1, "confidence": 1}]
        })));
        let nur_entries = r
            .degradations
            .iter()
            .filter(|d| d.source == "nur" && d.field == "severity_score")
            .count();
        assert_eq!(nur_entries, 1);
    }

    #[test]
    fn duplicate_isins_follow_policy() {
        let body = json!({
            "portfolio": [{"isin": "A", "weight": 10}, {"isin": "B", "weight": 10}, {"isin": "A", "weight": 80}]
        });

        let lenient = RiskIntegrator::default().integrate(&request(body.clone()));
        match &lenient.portfolio_hhi {
            ConcentrationOutcome::Computed(r) => {
                assert_eq!(r.n, 2);
                assert_eq!(r.total_weight, 90.0);
            }
            other => panic!("expected computed concentration, got {other:?}"),
        }
        assert!(lenient.degradations.contains(&Degradation::new(
            "portfolio[A]",
            "weight",
            DegradationReason::Duplicate
        )));

        let strict = RiskIntegrator::new(RiskConfig {
            duplicate_isins: DuplicatePolicy::Reject,
            ..Default::default()
        })
        .unwrap()
        .integrate(&request(body));
        assert!(strict.portfolio_hhi.error().unwrap().contains("Duplicate"));
    }

    #[test]
    fn trace_uses_wire_field_names() {
        let r = RiskIntegrator::default().integrate(&request(json!({
            "portfolio": [{"isin": "A", "weight": 1}],
            "nur": {"severity_score": 0.2, "source": "desk"},
            "provocations": [{"id": "p1", "source_type": "agency", "intensity": 3, "vector": "fx", "confidence": 0.8}]
        })));
        let json = serde_json::to_value(&r).unwrap();
        for key in [
            "portfolio_hhi",
            "hope",
            "sentiment_agg",
            "nur",
            "rsz",
            "cycles",
            "provocations",
            "chaotic_risk",
            "composite",
            "risk_level",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["nur"]["source"], "desk");
        assert_eq!(json["provocations"][0]["id"], "p1");
        assert!(json["risk_level"].is_string());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = RiskConfig::default();
        config.chaotic.global_dampen = f64::NAN;
        assert!(RiskIntegrator::new(config).is_err());
    }

    #[test]
    fn integrator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RiskIntegrator>();
    }
}
