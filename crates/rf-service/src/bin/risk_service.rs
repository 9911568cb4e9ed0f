use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rf_feed::ChartFeed;
use rf_risk::{RiskConfig, RiskIntegrator};
use rf_service::{serve, AppState, ServiceSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ServiceSettings::from_env();
    let integrator = RiskIntegrator::new(RiskConfig::from_env()?)?;
    let feed = ChartFeed::from_env();
    info!(
        feed_timeout_secs = settings.feed_timeout.as_secs(),
        openfigi = feed.has_mapper(),
        "risk integrator ready"
    );

    let state = AppState::new(integrator, Arc::new(feed)).with_feed_timeout(settings.feed_timeout);

    let listener = TcpListener::bind(&settings.addr).await?;
    info!("Riskfold risk service listening on {}", settings.addr);

    serve(listener, state).await?;
    Ok(())
}
