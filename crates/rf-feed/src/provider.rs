use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use rf_types::{FeedError, RfResult};

use crate::snapshot::FeedSnapshot;

pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(10);
pub const FEED_TIMEOUT_ENV_VAR: &str = "RISKFOLD_FEED_TIMEOUT_SECS";

/// Trait for market feeds (HTTP chart APIs, fixtures, etc.)
#[async_trait]
pub trait MarketFeed: Send + Sync + std::fmt::Debug {
    /// Fetch the snapshot for an ISIN or ticker.
    async fn fetch(&self, identifier: &str) -> RfResult<FeedSnapshot>;

    /// Get feed name
    fn name(&self) -> &str;
}

/// Feed timeout from `RISKFOLD_FEED_TIMEOUT_SECS`, falling back to 10 seconds
/// when unset or not a positive integer.
pub fn timeout_from_env() -> Duration {
    std::env::var(FEED_TIMEOUT_ENV_VAR)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_FEED_TIMEOUT)
}

/// Fetch a snapshot without ever failing. Errors and timeouts come back as a
/// neutral snapshot with `error` set.
pub async fn fetch_enriched_feed(
    feed: &dyn MarketFeed,
    identifier: &str,
    timeout: Duration,
) -> FeedSnapshot {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return FeedSnapshot::neutral();
    }

    match tokio::time::timeout(timeout, feed.fetch(identifier)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            warn!(feed = feed.name(), identifier, error = %e, "market feed returned no data");
            FeedSnapshot::failed(
                FeedError::NoData {
                    identifier: identifier.to_string(),
                }
                .to_string(),
            )
        }
        Err(_) => {
            let reason = FeedError::Timeout {
                identifier: identifier.to_string(),
                timeout_seconds: timeout.as_secs(),
            };
            warn!(feed = feed.name(), identifier, "{}", reason);
            FeedSnapshot::failed(reason.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct FixtureFeed {
        closes: HashMap<String, Vec<f64>>,
    }

    impl FixtureFeed {
        fn with(mut self, id: &str, closes: &[f64]) -> Self {
            self.closes.insert(id.to_string(), closes.to_vec());
            self
        }
    }

    #[async_trait]
    impl MarketFeed for FixtureFeed {
        async fn fetch(&self, identifier: &str) -> RfResult<FeedSnapshot> {
            self.closes
                .get(identifier)
                .map(|c| FeedSnapshot::from_series(c.clone()))
                .ok_or_else(|| {
                    FeedError::Status {
                        identifier: identifier.to_string(),
                        status: 404,
                    }
                    .into()
                })
        }

        fn name(&self) -> &str {
            "fixture"
        }
    }

    #[derive(Debug)]
    struct StalledFeed;

    #[async_trait]
    impl MarketFeed for StalledFeed {
        async fn fetch(&self, _identifier: &str) -> RfResult<FeedSnapshot> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(FeedSnapshot::neutral())
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn empty_identifier_is_neutral_without_error() {
        let feed = FixtureFeed::default();
        let snap = fetch_enriched_feed(&feed, "  ", DEFAULT_FEED_TIMEOUT).await;
        assert_eq!(snap, FeedSnapshot::neutral());
    }

    #[tokio::test]
    async fn known_identifier_passes_through() {
        let feed = FixtureFeed::default().with("US0378331005", &[200.0, 190.0]);
        let snap = fetch_enriched_feed(&feed, "US0378331005", DEFAULT_FEED_TIMEOUT).await;
        assert_eq!(snap.series, vec![200.0, 190.0]);
        assert!((snap.change_percent + 5.0).abs() < 1e-9);
        assert!(!snap.is_error());
    }

    #[tokio::test]
    async fn failure_becomes_neutral_with_error() {
        let feed = FixtureFeed::default();
        let snap = fetch_enriched_feed(&feed, "XS0000000000", DEFAULT_FEED_TIMEOUT).await;
        assert_eq!(snap.change_percent, 0.0);
        assert!(snap.series.is_empty());
        assert_eq!(snap.error.as_deref(), Some("No data for ISIN XS0000000000"));
    }

    #[tokio::test]
    async fn timeout_becomes_neutral_with_reason() {
        let snap = fetch_enriched_feed(&StalledFeed, "US0378331005", Duration::from_millis(20)).await;
        assert!(snap.series.is_empty());
        let error = snap.error.unwrap();
        assert!(error.starts_with("Timed out"), "{error}");
        assert!(error.contains("US0378331005"));
    }
}
