//! Daily close history from a Yahoo-style chart endpoint.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use rf_types::{FeedError, RfResult};

use crate::figi::FigiMapper;
use crate::provider::MarketFeed;
use crate::snapshot::FeedSnapshot;

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const CHART_RANGE: &str = "6mo";
pub const CHART_INTERVAL: &str = "1d";
/// Chart endpoints refuse requests without a browser-like agent.
pub const CHART_USER_AGENT: &str = "Mozilla/5.0 (compatible; riskfold/0.1)";

/// Chart-endpoint feed with optional ISIN to ticker fallback.
#[derive(Debug, Clone)]
pub struct ChartFeed {
    pub name: String,
    pub base_url: String,
    pub client: reqwest::Client,
    mapper: Option<FigiMapper>,
}

impl ChartFeed {
    pub fn new() -> Self {
        Self {
            name: "Yahoo Chart".to_string(),
            base_url: YAHOO_CHART_URL.to_string(),
            client: chart_client(),
            mapper: None,
        }
    }

    /// Feed with the OpenFIGI fallback enabled when a key is present.
    pub fn from_env() -> Self {
        let feed = Self::new();
        match FigiMapper::from_env() {
            Some(mapper) => feed.with_mapper(mapper),
            None => feed,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_mapper(mut self, mapper: FigiMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn has_mapper(&self) -> bool {
        self.mapper.is_some()
    }

    /// Request URL for one symbol.
    pub fn chart_url(&self, symbol: &str) -> RfResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| FeedError::Request {
            message: format!("invalid chart url '{}': {}", self.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| FeedError::Request {
                message: format!("chart url '{}' cannot take a path", self.base_url),
            })?
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("range", CHART_RANGE)
            .append_pair("interval", CHART_INTERVAL);
        Ok(url)
    }

    async fn fetch_series(&self, symbol: &str) -> RfResult<Vec<f64>> {
        let url = self.chart_url(symbol)?;
        debug!(%url, "requesting chart");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Request {
                message: format!("HTTP request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                identifier: symbol.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let json: Value = response.json().await.map_err(|e| FeedError::Payload {
            message: format!("Failed to parse JSON response: {}", e),
        })?;

        Ok(parse_chart(&json, symbol)?)
    }
}

fn chart_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(CHART_USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to a default HTTP client");
            reqwest::Client::new()
        })
}

impl Default for ChartFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketFeed for ChartFeed {
    async fn fetch(&self, identifier: &str) -> RfResult<FeedSnapshot> {
        let direct_err = match self.fetch_series(identifier).await {
            Ok(series) => {
                info!("Retrieved {} closes for {}", series.len(), identifier);
                return Ok(FeedSnapshot::from_series(series));
            }
            Err(e) => e,
        };

        let Some(mapper) = &self.mapper else {
            return Err(direct_err);
        };
        debug!(identifier, error = %direct_err, "direct lookup failed, mapping via OpenFIGI");

        match mapper.map_isin(identifier).await? {
            Some(ticker) if ticker != identifier => {
                let series = self.fetch_series(&ticker).await?;
                info!("Retrieved {} closes for {} as {}", series.len(), identifier, ticker);
                Ok(FeedSnapshot::from_series(series).with_enriched("mapped_ticker", ticker))
            }
            _ => Err(FeedError::NoData {
                identifier: identifier.to_string(),
            }
            .into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Extract the close series from a chart payload. Null closes become 0.
pub fn parse_chart(payload: &Value, identifier: &str) -> Result<Vec<f64>, FeedError> {
    let no_data = || FeedError::NoData {
        identifier: identifier.to_string(),
    };

    let chart = payload.get("chart").ok_or_else(|| FeedError::Payload {
        message: "Missing 'chart' in response".to_string(),
    })?;

    let result = match chart.get("result").and_then(Value::as_array) {
        Some(results) if !results.is_empty() => &results[0],
        _ => return Err(no_data()),
    };

    let closes = result
        .pointer("/indicators/quote/0/close")
        .and_then(Value::as_array)
        .ok_or_else(no_data)?;

    if closes.is_empty() {
        return Err(no_data());
    }

    Ok(closes
        .iter()
        .map(|v| v.as_f64().filter(|x| x.is_finite()).unwrap_or(0.0))
        .collect())
}
