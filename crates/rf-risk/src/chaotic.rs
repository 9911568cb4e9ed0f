//! Chaotic risk layer.
//!
//! Scores a batch of provocation signals (attempted market-moving actions by
//! institutions or individuals) into a single scalar in [0, 1]:
//!
//! 1. Each signal's intensity is weighted by its source class.
//! 2. Energy per thematic vector feeds a normalized Shannon entropy; low
//!    entropy means the batch is focused on few vectors (high coherence).
//! 3. The raw score is amplified by coherence and average confidence, then
//!    modulated by the NUR severity (amplifies) and RSZ stability (dampens).
//! 4. An arctan compression whose scale grows with total energy maps the
//!    unbounded score onto (0, 1) before the global dampening.
//!
//! The layer holds configuration only. Identical inputs, in the same order,
//! give bit-identical results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use tracing::debug;

use rf_types::{Degradation, DegradationReason, NurSignal, ProvocationSignal, RszSignal, SourceClass};

use crate::config::ChaoticRiskConfig;
use crate::round6;

/// Guards the log/arctan steps against a zero total.
const ENERGY_EPSILON: f64 = 1e-12;
/// Additive term in the arctan denominator.
const SCALE_EPSILON: f64 = 1e-6;
/// Ceiling of the RSZ dampener (stability 0).
const RSZ_DAMP_CEILING: f64 = 1.2;
/// Span of the RSZ dampener; stability 1 gives `CEILING - SPAN`.
const RSZ_DAMP_SPAN: f64 = 0.7;

/// Diagnostic tags attached to a chaotic-risk result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChaoticFlag {
    /// Energy concentrated on few vectors at high total intensity.
    FocusedHighIntensity,
    /// Institutional sources carry most of the energy.
    InstitutionalDominance,
    /// Material energy backed by little confidence.
    LowConfidenceNoise,
}

impl fmt::Display for ChaoticFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChaoticFlag::FocusedHighIntensity => "FOCUSED_HIGH_INTENSITY",
            ChaoticFlag::InstitutionalDominance => "INSTITUTIONAL_DOMINANCE",
            ChaoticFlag::LowConfidenceNoise => "LOW_CONFIDENCE_NOISE",
        };
        write!(f, "{}", s)
    }
}

/// Output of [`ChaoticRiskLayer::compute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChaoticRiskResult {
    pub cr_scalar: f64,
    /// Named intermediate values, rounded to 6 places; `vector_count` stays
    /// an integer. Empty when no provocations were supplied.
    pub components: BTreeMap<String, Value>,
    pub flags: Vec<ChaoticFlag>,
}

impl ChaoticRiskResult {
    pub fn component(&self, name: &str) -> Option<f64> {
        self.components.get(name).and_then(Value::as_f64)
    }

    pub fn has_flag(&self, flag: ChaoticFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Normalized Shannon entropy of a weight distribution, in [0, 1].
///
/// Only strictly positive weights count towards the support. Fewer than two
/// of them yields 0.
pub fn normalized_entropy<I>(weights: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let positive: Vec<f64> = weights.into_iter().filter(|w| *w > 0.0).collect();
    let total: f64 = positive.iter().sum();
    if positive.len() < 2 || total <= 0.0 {
        return 0.0;
    }

    let entropy: f64 = positive
        .iter()
        .map(|w| {
            let p = w / total;
            -p * (p + ENERGY_EPSILON).ln()
        })
        .sum();
    let max_entropy = (positive.len() as f64).ln();
    entropy / max_entropy
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Provocation scorer.
#[derive(Debug, Clone, Default)]
pub struct ChaoticRiskLayer {
    config: ChaoticRiskConfig,
}

impl ChaoticRiskLayer {
    pub fn new(config: ChaoticRiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChaoticRiskConfig {
        &self.config
    }

    fn class_weight(&self, class: SourceClass) -> f64 {
        match class {
            SourceClass::Institutional => self.config.w_institutional,
            SourceClass::Individual => self.config.w_individual,
        }
    }

    pub fn compute(
        &self,
        provocations: &[ProvocationSignal],
        nur: &NurSignal,
        rsz: &RszSignal,
    ) -> ChaoticRiskResult {
        self.compute_traced(provocations, nur, rsz, &mut Vec::new())
    }

    /// Like [`compute`](Self::compute), appending any degraded NUR/RSZ fields
    /// to `trail`.
    pub fn compute_traced(
        &self,
        provocations: &[ProvocationSignal],
        nur: &NurSignal,
        rsz: &RszSignal,
        trail: &mut Vec<Degradation>,
    ) -> ChaoticRiskResult {
        if provocations.is_empty() {
            return ChaoticRiskResult::default();
        }

        let mut sum_inst = 0.0;
        let mut sum_ind = 0.0;
        let mut confidence_sum = 0.0;
        let mut vector_energy: BTreeMap<&str, f64> = BTreeMap::new();

        for p in provocations {
            let weighted = finite_or_zero(p.intensity) * self.class_weight(p.source_class);
            match p.source_class {
                SourceClass::Institutional => sum_inst += weighted,
                SourceClass::Individual => sum_ind += weighted,
            }
            *vector_energy.entry(p.vector.as_str()).or_insert(0.0) += weighted.abs();
            confidence_sum += finite_or_zero(p.confidence);
        }

        let total_energy = sum_inst + sum_ind + ENERGY_EPSILON;
        let coherence = 1.0 - normalized_entropy(vector_energy.values().copied());
        let avg_confidence = confidence_sum / provocations.len() as f64;

        let raw = (sum_inst + sum_ind)
            * (1.0 + self.config.w_vector_coherence * coherence)
            * (1.0 + self.config.w_confidence * avg_confidence);

        let (severity, severity_field) = nur.amplifier_severity();
        let (stability, stability_field) = rsz.dampener_stability();
        // an absent amplifier input is the normal case; only malformed ones are recorded
        let severity = severity.clamped_unit();
        let stability = stability.clamped_unit();
        for (resolved, source, field) in [
            (severity, "nur", severity_field),
            (stability, "rsz", stability_field),
        ] {
            if resolved.reason != Some(DegradationReason::Missing) {
                trail.extend(resolved.degradation(source, field));
            }
        }

        let nur_amp = 1.0 + severity.value;
        let rsz_damp = RSZ_DAMP_CEILING - stability.value * RSZ_DAMP_SPAN;
        let modulated = raw * nur_amp * rsz_damp;

        let scale = 1.0 + (total_energy + 1.0).log10();
        let compressed = finite_or_zero((modulated / (scale + SCALE_EPSILON)).atan() / FRAC_PI_2);
        let cr_scalar = (compressed * self.config.global_dampen).clamp(0.0, 1.0);

        let mut flags = Vec::new();
        if coherence > 0.8 && total_energy > 10.0 {
            flags.push(ChaoticFlag::FocusedHighIntensity);
        }
        if sum_inst > 0.6 * total_energy && total_energy > 1.0 {
            flags.push(ChaoticFlag::InstitutionalDominance);
        }
        if avg_confidence < 0.25 && total_energy > 2.0 {
            flags.push(ChaoticFlag::LowConfidenceNoise);
        }

        let mut components: BTreeMap<String, Value> = [
            ("sum_institutional", sum_inst),
            ("sum_individual", sum_ind),
            ("total_energy", total_energy),
            ("vector_coherence", coherence),
            ("avg_confidence", avg_confidence),
            ("nur_amp", nur_amp),
            ("rsz_damp", rsz_damp),
            ("raw_modulated", modulated),
            ("compressed", compressed),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), Value::from(round6(value))))
        .collect();
        components.insert("vector_count".to_string(), Value::from(vector_energy.len()));

        debug!(
            signals = provocations.len(),
            total_energy,
            coherence,
            cr_scalar,
            "chaotic risk computed"
        );

        ChaoticRiskResult {
            cr_scalar: round6(cr_scalar),
            components,
            flags,
        }
    }
}
