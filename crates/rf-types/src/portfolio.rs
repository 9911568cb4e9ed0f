use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::errors::RfResult;
use crate::validation_error;

/// One line of the submitted portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub isin: String,
    #[serde(default, deserialize_with = "numeric_weight")]
    pub weight: f64,
}

/// Weights arrive as JSON numbers or numeric strings (`"40"`).
fn numeric_weight<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("weight is not representable as f64")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("weight '{}' is not a number", s))),
        other => Err(serde::de::Error::custom(format!(
            "weight must be a number, got {}",
            other
        ))),
    }
}

impl PortfolioHolding {
    pub fn new(isin: &str, weight: f64) -> Self {
        Self {
            isin: isin.to_string(),
            weight,
        }
    }
}

/// What to do when the same identifier appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first-seen position, take the last value.
    #[default]
    LastWins,
    /// Refuse the portfolio.
    Reject,
}

/// Ordered identifier → weight mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns `true` if the identifier was already present.
    pub fn insert(&mut self, isin: impl Into<String>, weight: f64) -> bool {
        let isin = isin.into();
        match self.index.get(&isin) {
            Some(&pos) => {
                self.entries[pos].1 = weight;
                true
            }
            None => {
                self.index.insert(isin.clone(), self.entries.len());
                self.entries.push((isin, weight));
                false
            }
        }
    }

    /// Build from holdings, applying `policy` to repeated identifiers.
    ///
    /// Returns the map and the identifiers that were seen more than once.
    pub fn from_holdings(
        holdings: &[PortfolioHolding],
        policy: DuplicatePolicy,
    ) -> RfResult<(Self, Vec<String>)> {
        let mut map = Self::new();
        let mut duplicates: Vec<String> = Vec::new();
        let mut reported: HashSet<&str> = HashSet::new();
        for h in holdings {
            if map.insert(h.isin.clone(), h.weight) && reported.insert(h.isin.as_str()) {
                duplicates.push(h.isin.clone());
            }
        }
        if policy == DuplicatePolicy::Reject && !duplicates.is_empty() {
            return Err(validation_error!(
                "Duplicate ISINs in portfolio: {}",
                duplicates.join(", ")
            ));
        }
        Ok((map, duplicates))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| *w).sum()
    }

    pub fn get(&self, isin: &str) -> Option<f64> {
        self.index.get(isin).map(|&pos| self.entries[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, w)| (k.as_str(), *w))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, w) in iter {
            map.insert(k, w);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_first_seen_order() {
        let map: WeightMap = vec![("B", 1.0), ("A", 2.0), ("C", 3.0)].into_iter().collect();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
        assert_eq!(map.total(), 6.0);
    }

    #[test]
    fn duplicates_last_value_wins_by_default() {
        let holdings = vec![
            PortfolioHolding::new("US1", 40.0),
            PortfolioHolding::new("US2", 60.0),
            PortfolioHolding::new("US1", 10.0),
        ];
        let (map, dups) = WeightMap::from_holdings(&holdings, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("US1"), Some(10.0));
        assert_eq!(map.iter().next().map(|(k, _)| k), Some("US1"));
        assert_eq!(dups, vec!["US1".to_string()]);
    }

    #[test]
    fn duplicates_rejected_under_strict_policy() {
        let holdings = vec![
            PortfolioHolding::new("US1", 40.0),
            PortfolioHolding::new("US1", 60.0),
        ];
        let err = WeightMap::from_holdings(&holdings, DuplicatePolicy::Reject).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("US1"));
    }

    #[test]
    fn repeated_duplicates_reported_once() {
        let holdings: Vec<PortfolioHolding> = (0..5_000)
            .map(|i| PortfolioHolding::new(&format!("ISIN{}", i % 2_500), i as f64))
            .collect();
        let (map, dups) = WeightMap::from_holdings(&holdings, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(map.len(), 2_500);
        assert_eq!(dups.len(), 2_500);
        assert_eq!(dups[0], "ISIN0");
        assert_eq!(map.get("ISIN7"), Some(2_507.0));
        assert_eq!(map.iter().nth(7).map(|(k, _)| k), Some("ISIN7"));
    }

    #[test]
    fn numeric_string_weight_accepted() {
        let h: PortfolioHolding = serde_json::from_str(r#"{"isin": "US1", "weight": " 40.5 "}"#).unwrap();
        assert_eq!(h.weight, 40.5);

        assert!(serde_json::from_str::<PortfolioHolding>(r#"{"isin": "US1", "weight": "forty"}"#).is_err());
        assert!(serde_json::from_str::<PortfolioHolding>(r#"{"isin": "US1", "weight": [40]}"#).is_err());
    }

    #[test]
    fn missing_weight_defaults_to_zero() {
        let h: PortfolioHolding = serde_json::from_str(r#"{"isin": "DE000"}"#).unwrap();
        assert_eq!(h.weight, 0.0);
    }
}
