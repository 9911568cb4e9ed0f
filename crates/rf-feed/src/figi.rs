//! ISIN to exchange ticker mapping through OpenFIGI.

use serde_json::{json, Value};
use tracing::debug;

use rf_types::{FeedError, RfResult};

pub const OPENFIGI_URL: &str = "https://api.openfigi.com/v3/mapping";
pub const OPENFIGI_KEY_ENV_VAR: &str = "OPENFIGI_API_KEY";

#[derive(Clone)]
pub struct FigiMapper {
    pub endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

// keep the key out of logs
impl std::fmt::Debug for FigiMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FigiMapper")
            .field("endpoint", &self.endpoint)
            .field("api_key_set", &!self.api_key.is_empty())
            .finish()
    }
}

impl FigiMapper {
    pub fn new(api_key: String) -> Self {
        Self {
            endpoint: OPENFIGI_URL.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Mapper for `OPENFIGI_API_KEY`; `None` when unset or blank.
    pub fn from_env() -> Option<Self> {
        std::env::var(OPENFIGI_KEY_ENV_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Look up a ticker for `isin`. `Ok(None)` when OpenFIGI knows no match.
    pub async fn map_isin(&self, isin: &str) -> RfResult<Option<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-OPENFIGI-APIKEY", &self.api_key)
            .json(&mapping_request(isin))
            .send()
            .await
            .map_err(|e| FeedError::Request {
                message: format!("OpenFIGI request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                identifier: isin.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let body: Value = response.json().await.map_err(|e| FeedError::Payload {
            message: format!("Failed to parse OpenFIGI response: {}", e),
        })?;

        let ticker = parse_mapping(&body);
        debug!(isin, ticker = ?ticker, "OpenFIGI mapping");
        Ok(ticker)
    }
}

pub fn mapping_request(isin: &str) -> Value {
    json!([{ "idType": "ID_ISIN", "idValue": isin }])
}

/// First match of a mapping response, as `TICKER.EXCH` when the exchange
/// code is known.
pub fn parse_mapping(body: &Value) -> Option<String> {
    let record = body.pointer("/0/data/0")?;
    let text = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let ticker = text("ticker").or_else(|| text("compositeFIGI"))?;
    Some(match text("exchCode") {
        Some(exch) => format!("{ticker}.{exch}"),
        None => ticker.to_string(),
    })
}
