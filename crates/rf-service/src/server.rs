use std::time::Duration;
use tokio::net::TcpListener;

use crate::routes::{router, AppState};

pub const ADDR_ENV_VAR: &str = "RISKFOLD_ADDR";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8081";

/// Process-level settings read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub addr: String,
    pub feed_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var(ADDR_ENV_VAR).unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            feed_timeout: rf_feed::timeout_from_env(),
        }
    }
}

/// Serve the router on `listener` until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
