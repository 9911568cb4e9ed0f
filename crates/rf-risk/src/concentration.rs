//! Portfolio concentration via the Herfindahl–Hirschman Index.
//!
//! [`ConcentrationIndex::compute`] accepts raw weights in any unit
//! (percentages, notionals, share counts) and normalizes them itself.

use serde::{Deserialize, Serialize};

use rf_types::{validation_error, RfResult, WeightMap};

use crate::round6;

/// Per-holding breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationItem {
    pub isin: String,
    pub weight: f64,
    /// Share of total weight.
    pub pct: f64,
    /// `pct` squared, the holding's HHI contribution.
    pub pct_sq: f64,
}

/// HHI over a set of holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationResult {
    /// Raw index in [1/n, 1].
    pub hhi: f64,
    /// Index remapped onto [0, 1].
    pub hhi_normalized: f64,
    pub n: usize,
    pub total_weight: f64,
    pub items: Vec<ConcentrationItem>,
}

/// Stateless HHI calculator.
pub struct ConcentrationIndex;

impl ConcentrationIndex {
    pub fn compute(weights: &WeightMap) -> RfResult<ConcentrationResult> {
        if weights.is_empty() {
            return Err(validation_error!("No weights provided"));
        }
        if let Some((isin, w)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(validation_error!("Weight for {} must be a non-negative number, got {}", isin, w));
        }

        let total = weights.total();
        if total == 0.0 {
            return Err(validation_error!("Total weights = 0"));
        }

        let mut hhi = 0.0;
        let mut items = Vec::with_capacity(weights.len());
        for (isin, weight) in weights.iter() {
            let pct = weight / total;
            let pct_sq = pct * pct;
            hhi += pct_sq;
            items.push(ConcentrationItem {
                isin: isin.to_string(),
                weight,
                pct: round6(pct),
                pct_sq: round6(pct_sq),
            });
        }

        let n = weights.len();
        let hhi_normalized = if n > 1 {
            let floor = 1.0 / n as f64;
            ((hhi - floor) / (1.0 - floor)).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Ok(ConcentrationResult {
            hhi: round6(hhi),
            hhi_normalized: round6(hhi_normalized),
            n,
            total_weight: total,
            items,
        })
    }

    /// Concentration from two comma-separated lists, e.g. `"US1,US2"` and
    /// `"40,60"`. Blank entries are ignored.
    pub fn compute_from_lists(isins: &str, weights: &str) -> RfResult<ConcentrationResult> {
        let ids: Vec<&str> = split_list(isins).collect();
        let values = split_list(weights)
            .map(|w| w.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| validation_error!("Weights must be numeric"))?;

        if ids.len() != values.len() {
            return Err(validation_error!("ISINs count does not match weights count"));
        }

        let map: WeightMap = ids.into_iter().zip(values).collect();
        Self::compute(&map)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> WeightMap {
        pairs.iter().map(|(k, w)| (*k, *w)).collect()
    }

    #[test]
    fn equal_weights_are_unconcentrated() {
        let r = ConcentrationIndex::compute(&weights(&[("A", 50.0), ("B", 50.0)])).unwrap();
        assert_eq!(r.hhi, 0.5);
        assert_eq!(r.hhi_normalized, 0.0);
        assert_eq!(r.n, 2);
        assert_eq!(r.total_weight, 100.0);
    }

    #[test]
    fn single_holding_is_fully_concentrated() {
        let r = ConcentrationIndex::compute(&weights(&[("A", 100.0)])).unwrap();
        assert_eq!(r.hhi, 1.0);
        assert_eq!(r.n, 1);
        assert_eq!(r.hhi_normalized, 1.0);
        assert_eq!(r.items[0].pct, 1.0);
    }

    #[test]
    fn skewed_portfolio_breakdown() {
        let r = ConcentrationIndex::compute(&weights(&[("A", 70.0), ("B", 20.0), ("C", 10.0)])).unwrap();
        // 0.49 + 0.04 + 0.01
        assert_eq!(r.hhi, 0.54);
        // (0.54 - 1/3) / (2/3) = 0.31
        assert!((r.hhi_normalized - 0.31).abs() < 1e-6);
        let isins: Vec<&str> = r.items.iter().map(|i| i.isin.as_str()).collect();
        assert_eq!(isins, vec!["A", "B", "C"]);
        assert_eq!(r.items[1].pct_sq, 0.04);
    }

    #[test]
    fn hhi_stays_within_bounds() {
        let cases: Vec<Vec<f64>> = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.0, 0.0, 5.0],
            vec![1e-9, 1e9],
            vec![3.0; 17],
        ];
        for ws in cases {
            let map: WeightMap = ws.iter().enumerate().map(|(i, w)| (format!("I{i}"), *w)).collect();
            let r = ConcentrationIndex::compute(&map).unwrap();
            let floor = 1.0 / r.n as f64;
            assert!(r.hhi >= floor - 1e-6 && r.hhi <= 1.0 + 1e-6, "hhi {} out of range", r.hhi);
            assert!((0.0..=1.0).contains(&r.hhi_normalized));
        }
    }

    #[test]
    fn empty_and_zero_sum_fail() {
        let empty = ConcentrationIndex::compute(&WeightMap::new()).unwrap_err();
        assert_eq!(empty.to_string(), "No weights provided");
        let zero = ConcentrationIndex::compute(&weights(&[("A", 0.0), ("B", 0.0)])).unwrap_err();
        assert_eq!(zero.to_string(), "Total weights = 0");
    }

    #[test]
    fn negative_weight_fails() {
        let err = ConcentrationIndex::compute(&weights(&[("A", 10.0), ("B", -5.0)])).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("B"));
    }

    #[test]
    fn lists_are_parsed_and_paired() {
        let r = ConcentrationIndex::compute_from_lists("US111, US222,", "40,60").unwrap();
        assert_eq!(r.n, 2);
        assert_eq!(r.items[0].isin, "US111");
        assert_eq!(r.items[1].pct, 0.6);
    }

    #[test]
    fn lists_with_non_numeric_weight_fail() {
        let err = ConcentrationIndex::compute_from_lists("A,B", "40,abc").unwrap_err();
        assert_eq!(err.to_string(), "Weights must be numeric");
    }

    #[test]
    fn lists_with_count_mismatch_fail() {
        let err = ConcentrationIndex::compute_from_lists("A,B,C", "40,60").unwrap_err();
        assert_eq!(err.to_string(), "ISINs count does not match weights count");
    }
}
