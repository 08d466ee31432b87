use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::{DiscoveryError, GatewayError, ValidationError};
use crate::gateway::GatewayStatus;
use crate::model::NicheQuery;
use crate::scoring::{ChannelInsight, NicheAnalysis, NicheAnalyzer};

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<NicheAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: NicheAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }

    pub fn analyzer(&self) -> &NicheAnalyzer {
        &self.analyzer
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/analyze", get(analyze))
        .route("/api/channels", get(channels))
        .route("/api/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Query string shared by `/api/analyze` and `/api/channels`.
#[derive(Debug, Default, Deserialize)]
struct NicheParams {
    #[serde(default)]
    niche: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    category: Option<String>,
    /// RFC 3339 instant.
    #[serde(default)]
    as_of: Option<String>,
}

impl NicheParams {
    fn into_query(self) -> Result<NicheQuery, ApiError> {
        let mut q = NicheQuery::new(self.niche.unwrap_or_default());
        if let Some(r) = self.region {
            q = q.with_region(r);
        }
        if let Some(c) = self.category {
            q = q.with_category_hint(c);
        }
        if let Some(raw) = self.as_of.filter(|s| !s.trim().is_empty()) {
            let parsed = DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|_| ApiError::BadParam("as_of must be an RFC 3339 timestamp".into()))?;
            q = q.with_as_of(parsed.with_timezone(&Utc));
        }
        Ok(q)
    }
}

enum ApiError {
    Validation(ValidationError),
    BadParam(String),
    Unavailable(GatewayError),
}

impl From<DiscoveryError> for ApiError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Validation(v) => ApiError::Validation(v),
            DiscoveryError::Gateway(g) => ApiError::Unavailable(g),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string(), "kind": e })),
            )
                .into_response(),
            ApiError::BadParam(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Unavailable(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string(), "attempted": e.attempted() })),
            )
                .into_response(),
        }
    }
}

async fn analyze(
    State(state): State<AppState>,
    Query(params): Query<NicheParams>,
) -> Result<Json<NicheAnalysis>, ApiError> {
    let query = params.into_query()?;
    match state.analyzer.analyze(query).await {
        Ok(analysis) => Ok(Json(analysis)),
        Err(e) => {
            info!(target: "api", error = %e, "rejected analyze request");
            Err(ApiError::Validation(e))
        }
    }
}

#[derive(Serialize)]
struct ChannelsOut {
    niche: String,
    channels: Vec<ChannelInsight>,
}

async fn channels(
    State(state): State<AppState>,
    Query(params): Query<NicheParams>,
) -> Result<Json<ChannelsOut>, ApiError> {
    let query = params.into_query()?;
    let niche = query.niche.split_whitespace().collect::<Vec<_>>().join(" ");
    match state.analyzer.discover_channels(query).await {
        Ok(channels) => Ok(Json(ChannelsOut { niche, channels })),
        Err(e) => {
            warn!(target: "api", error = %e, "channel discovery failed");
            Err(e.into())
        }
    }
}

async fn status(State(state): State<AppState>) -> Json<GatewayStatus> {
    Json(state.analyzer.gateway().status())
}
