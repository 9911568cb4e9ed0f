use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::signals::{Degradation, Resolved};

/// A provocation entry exactly as it arrived on the wire.
///
/// Every field is optional and loosely typed; [`ProvocationSignal::from_raw`]
/// turns it into the typed form and records what had to be defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProvocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which weighting class a provocation falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceClass {
    /// Institutions, states and agencies.
    Institutional,
    /// Everything else.
    Individual,
}

impl SourceClass {
    /// Classify a `source_type` label. Unknown labels are individual-like.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "institutional" | "state" | "agency" => SourceClass::Institutional,
            _ => SourceClass::Individual,
        }
    }
}

/// Vector label used when a provocation carries none.
pub const UNKNOWN_VECTOR: &str = "unknown";

/// A typed provocation signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvocationSignal {
    pub id: Option<String>,
    pub source_class: SourceClass,
    pub intensity: f64,
    pub vector: String,
    pub confidence: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProvocationSignal {
    pub fn new(source_class: SourceClass, intensity: f64, vector: &str, confidence: f64) -> Self {
        Self {
            id: None,
            source_class,
            intensity,
            vector: vector.to_string(),
            confidence,
            timestamp: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a typed signal from a wire entry. Malformed numeric fields become
    /// 0 and are appended to `trail` under `source`.
    pub fn from_raw(raw: &RawProvocation, source: &str, trail: &mut Vec<Degradation>) -> Self {
        let intensity = Resolved::from_field(raw.intensity.as_ref());
        let confidence = Resolved::from_field(raw.confidence.as_ref());
        trail.extend(intensity.degradation(source, "intensity"));
        trail.extend(confidence.degradation(source, "confidence"));

        let source_class = match &raw.source_type {
            Some(Value::String(label)) => SourceClass::from_label(label),
            _ => SourceClass::Individual,
        };

        Self {
            id: raw.id.as_ref().and_then(label_of),
            source_class,
            intensity: intensity.value,
            vector: raw
                .vector
                .as_ref()
                .and_then(label_of)
                .unwrap_or_else(|| UNKNOWN_VECTOR.to_string()),
            confidence: confidence.value,
            timestamp: raw.timestamp.as_ref().and_then(parse_timestamp),
        }
    }
}

/// Render a scalar JSON value as a label. Empty strings, null and compound
/// values yield `None`.
fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// RFC 3339 strings or epoch seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
        }
        _ => None,
    }
}
