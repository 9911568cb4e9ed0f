//! Externally owned macro signal bundles (NUR, RSZ, cycles) and the
//! fail-soft scalar resolution shared by every engine.
//!
//! Upstream producers send loosely shaped JSON objects. Each bundle keeps the
//! fields Riskfold reads as named optional values and carries everything else
//! in `extra`, so the composite trace can echo the bundle as received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Why a field was replaced by its neutral default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationReason {
    /// Field absent, null or an empty string.
    Missing,
    /// Field present but not interpretable as a number.
    NotNumeric,
    /// Field parsed to NaN or an infinity.
    NonFinite,
    /// Field numeric but outside its documented range; the value was clamped.
    OutOfRange,
    /// Identifier repeated; an earlier value was overwritten.
    Duplicate,
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DegradationReason::Missing => "missing",
            DegradationReason::NotNumeric => "not numeric",
            DegradationReason::NonFinite => "non-finite",
            DegradationReason::OutOfRange => "out of range",
            DegradationReason::Duplicate => "duplicate",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the audit trail: `source.field` was degraded for `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Degradation {
    pub source: String,
    pub field: String,
    pub reason: DegradationReason,
}

impl Degradation {
    pub fn new(source: impl Into<String>, field: impl Into<String>, reason: DegradationReason) -> Self {
        Self {
            source: source.into(),
            field: field.into(),
            reason,
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.source, self.field, self.reason)
    }
}

/// A scalar read from untrusted input, paired with the reason a default was
/// substituted (if one was).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub value: f64,
    pub reason: Option<DegradationReason>,
}

impl Resolved {
    pub fn exact(value: f64) -> Self {
        Self { value, reason: None }
    }

    pub fn defaulted(reason: DegradationReason) -> Self {
        Self { value: 0.0, reason: Some(reason) }
    }

    /// Interpret a raw JSON field. Numbers and numeric strings are accepted;
    /// anything else resolves to 0.
    pub fn from_field(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => Self::defaulted(DegradationReason::Missing),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => Self::exact(v),
                Some(_) => Self::defaulted(DegradationReason::NonFinite),
                None => Self::defaulted(DegradationReason::NotNumeric),
            },
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Self::defaulted(DegradationReason::Missing);
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => Self::exact(v),
                    Ok(_) => Self::defaulted(DegradationReason::NonFinite),
                    Err(_) => Self::defaulted(DegradationReason::NotNumeric),
                }
            }
            Some(_) => Self::defaulted(DegradationReason::NotNumeric),
        }
    }

    /// Clamp into [0, 1]. An in-range value keeps its original status.
    pub fn clamped_unit(self) -> Self {
        let clamped = self.value.clamp(0.0, 1.0);
        if clamped != self.value && self.reason.is_none() {
            Self {
                value: clamped,
                reason: Some(DegradationReason::OutOfRange),
            }
        } else {
            Self { value: clamped, ..self }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.reason.is_some()
    }

    /// Audit entry for this value, if it was degraded.
    pub fn degradation(&self, source: &str, field: &str) -> Option<Degradation> {
        self.reason.map(|reason| Degradation::new(source, field, reason))
    }
}

/// Common shape of a macro signal bundle.
pub trait MacroSignal {
    /// Name used in the degradation trail.
    const SOURCE: &'static str;
    /// Field feeding the composite score.
    const HEADLINE_FIELD: &'static str;

    /// The scalar this bundle contributes to the composite, unclamped.
    fn headline(&self) -> Resolved;
}

/// Novelty/uncertainty bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NurSignal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NurSignal {
    pub fn with_severity(score: f64) -> Self {
        Self {
            severity_score: Some(Value::from(score)),
            ..Default::default()
        }
    }

    /// Severity used for chaotic-risk amplification: `severity_score`, or the
    /// legacy `severity` field when the former is absent.
    pub fn amplifier_severity(&self) -> (Resolved, &'static str) {
        match &self.severity_score {
            Some(v) => (Resolved::from_field(Some(v)), "severity_score"),
            None => (Resolved::from_field(self.severity.as_ref()), "severity"),
        }
    }
}

impl MacroSignal for NurSignal {
    const SOURCE: &'static str = "nur";
    const HEADLINE_FIELD: &'static str = "severity_score";

    fn headline(&self) -> Resolved {
        Resolved::from_field(self.severity_score.as_ref())
    }
}

/// Action/stability bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RszSignal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_weight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability_score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RszSignal {
    pub fn with_action_weight(weight: f64) -> Self {
        Self {
            action_weight: Some(Value::from(weight)),
            ..Default::default()
        }
    }

    pub fn with_stability(score: f64) -> Self {
        Self {
            stability_score: Some(Value::from(score)),
            ..Default::default()
        }
    }

    /// Stability used for chaotic-risk dampening: `stability_score`, or
    /// `action_weight` when the former is absent.
    pub fn dampener_stability(&self) -> (Resolved, &'static str) {
        match &self.stability_score {
            Some(v) => (Resolved::from_field(Some(v)), "stability_score"),
            None => (Resolved::from_field(self.action_weight.as_ref()), "action_weight"),
        }
    }
}

impl MacroSignal for RszSignal {
    const SOURCE: &'static str = "rsz";
    const HEADLINE_FIELD: &'static str = "action_weight";

    fn headline(&self) -> Resolved {
        Resolved::from_field(self.action_weight.as_ref())
    }
}

/// Market-cycle bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSignal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_pressure: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CycleSignal {
    pub fn with_pressure(pressure: f64) -> Self {
        Self {
            cycle_pressure: Some(Value::from(pressure)),
            ..Default::default()
        }
    }
}

impl MacroSignal for CycleSignal {
    const SOURCE: &'static str = "cycles";
    const HEADLINE_FIELD: &'static str = "cycle_pressure";

    fn headline(&self) -> Resolved {
        Resolved::from_field(self.cycle_pressure.as_ref())
    }
}
