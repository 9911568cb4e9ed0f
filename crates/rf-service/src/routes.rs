use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info_span};
use uuid::Uuid;

use rf_feed::{fetch_enriched_feed, FeedSnapshot, MarketFeed, DEFAULT_FEED_TIMEOUT};
use rf_risk::{
    CompositeRiskResult, ConcentrationIndex, MispricingIndex, RiskIntegrator, RiskRequest,
    SentimentAggregate,
};

pub const SERVICE_MESSAGE: &str = "Riskfold risk API is running";

/// Shared, read-only state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub integrator: Arc<RiskIntegrator>,
    pub feed: Arc<dyn MarketFeed>,
    pub feed_timeout: Duration,
}

impl AppState {
    pub fn new(integrator: RiskIntegrator, feed: Arc<dyn MarketFeed>) -> Self {
        Self {
            integrator: Arc::new(integrator),
            feed,
            feed_timeout: DEFAULT_FEED_TIMEOUT,
        }
    }

    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = timeout;
        self
    }
}

/// Error answered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::unprocessable(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::unprocessable(format!("Invalid query: {}", rejection.body_text()))
    }
}

/// The full service router with tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/risk/full", post(full_risk))
        .route("/risk/hhi", post(hhi))
        .route("/risk/sentiment", post(sentiment))
        .route("/market/feed", get(market_feed))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %request.method(),
                path = %request.uri().path()
            )
        }))
        .layer(cors)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": SERVICE_MESSAGE }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}

async fn full_risk(
    State(state): State<AppState>,
    payload: Result<Json<RiskRequest>, JsonRejection>,
) -> Result<Json<CompositeRiskResult>, ApiError> {
    let Json(request) = payload?;
    debug!(holdings = request.portfolio.len(), "scoring full risk request");

    // scoring is CPU-bound and sized by the request
    let integrator = Arc::clone(&state.integrator);
    let result = tokio::task::spawn_blocking(move || integrator.integrate(&request))
        .await
        .map_err(|e| {
            error!(error = %e, "risk scoring task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct HhiParams {
    isins: Option<String>,
    weights: Option<String>,
}

async fn hhi(params: Result<Query<HhiParams>, QueryRejection>) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let (isins, weights) = match (params.isins, params.weights) {
        (Some(i), Some(w)) => (i, w),
        (None, _) => return Err(ApiError::unprocessable("Missing query parameter 'isins'")),
        (_, None) => return Err(ApiError::unprocessable("Missing query parameter 'weights'")),
    };
    Ok(match ConcentrationIndex::compute_from_lists(&isins, &weights) {
        Ok(result) => Json(result).into_response(),
        Err(e) => Json(json!({ "error": e.to_string() })).into_response(),
    })
}

async fn sentiment(
    payload: Result<Json<Vec<f64>>, JsonRejection>,
) -> Result<Json<SentimentAggregate>, ApiError> {
    let Json(values) = payload?;
    Ok(Json(MispricingIndex::aggregate_sentiment(&values)))
}

#[derive(Debug, Deserialize)]
struct FeedParams {
    #[serde(default)]
    id: String,
}

async fn market_feed(
    State(state): State<AppState>,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedSnapshot>, ApiError> {
    let Query(params) = params?;
    Ok(Json(
        fetch_enriched_feed(state.feed.as_ref(), &params.id, state.feed_timeout).await,
    ))
}
