//! Market feed collaborator for Riskfold.
//!
//! The feed is outside the scoring pipeline: any failure is turned into a
//! neutral [`FeedSnapshot`] at the [`fetch_enriched_feed`] boundary.

pub mod chart;
pub mod figi;
pub mod provider;
pub mod snapshot;

pub use chart::{parse_chart, ChartFeed, YAHOO_CHART_URL};
pub use figi::{parse_mapping, FigiMapper, OPENFIGI_KEY_ENV_VAR, OPENFIGI_URL};
pub use provider::{
    fetch_enriched_feed, timeout_from_env, MarketFeed, DEFAULT_FEED_TIMEOUT, FEED_TIMEOUT_ENV_VAR,
};
pub use snapshot::{change_percent, FeedSnapshot};
