use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Market context for one identifier as returned by the feed boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub change_percent: f64,
    #[serde(default)]
    pub indicators: Map<String, Value>,
    #[serde(default)]
    pub series: Vec<f64>,
    #[serde(default)]
    pub enriched: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedSnapshot {
    /// Empty snapshot with no error attached.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Empty snapshot carrying the reason no data was returned.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Snapshot built from a close series.
    pub fn from_series(series: Vec<f64>) -> Self {
        Self {
            change_percent: change_percent(&series),
            series,
            ..Self::default()
        }
    }

    pub fn with_enriched(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.enriched.insert(key.to_string(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Percentage move between the last two closes; 0 when not computable.
pub fn change_percent(series: &[f64]) -> f64 {
    match series {
        [.., prev, last] if *prev != 0.0 => {
            let change = (last - prev) / prev * 100.0;
            if change.is_finite() {
                change
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}
