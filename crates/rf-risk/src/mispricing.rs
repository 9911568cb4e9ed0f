//! Hope Mispricing Index and sentiment aggregation.

use serde::{Deserialize, Serialize};

use crate::round6;

/// Ratios above this are treated as this.
pub const HMI_CLIP: f64 = 1e6;

/// Outcome of [`MispricingIndex::compute_hmi`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopeResult {
    /// Expectation / objective probability; `None` when not computable.
    pub hmi: Option<f64>,
    pub hmi_normalized: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HopeResult {
    /// Neutral result used when no market inputs were supplied.
    pub fn absent() -> Self {
        Self {
            hmi: None,
            hmi_normalized: 0.0,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Mean and population standard deviation of sentiment readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentAggregate {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// Stateless mispricing and sentiment calculator.
pub struct MispricingIndex;

impl MispricingIndex {
    pub fn compute_hmi(market_expectation: f64, objective_probability: Option<f64>) -> HopeResult {
        let objective = match objective_probability {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => {
                return HopeResult {
                    hmi: None,
                    hmi_normalized: 0.0,
                    error: Some("objective_prob must be > 0".to_string()),
                }
            }
        };

        let hmi = market_expectation / objective;
        HopeResult {
            hmi: hmi.is_finite().then_some(hmi),
            hmi_normalized: Self::normalize(hmi),
            error: None,
        }
    }

    /// Log-then-decay compression of a heavy-tailed ratio onto [0, 1].
    pub fn normalize(hmi: f64) -> f64 {
        if hmi.is_nan() {
            return 0.0;
        }
        let clipped = hmi.clamp(0.0, HMI_CLIP);
        let norm = 1.0 - (-(clipped + 1.0).log10()).exp();
        if norm.is_finite() {
            norm.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn aggregate_sentiment(values: &[f64]) -> SentimentAggregate {
        if values.is_empty() {
            return SentimentAggregate::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            var.sqrt()
        } else {
            0.0
        };
        SentimentAggregate {
            mean: round6(mean),
            std: round6(std),
            count: values.len(),
        }
    }
}
