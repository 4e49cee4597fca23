// Axum API Server Module
//
// Purpose: REST API over the nutrient engine (aggregation, scoring, section
// comments, report export) with a Moka cache for generated comments.

#[cfg(feature = "api")]
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};

#[cfg(feature = "api")]
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};

#[cfg(feature = "api")]
use moka::future::Cache;

#[cfg(feature = "api")]
use serde::Deserialize;

#[cfg(feature = "api")]
use std::sync::Arc;

#[cfg(feature = "api")]
use std::time::Duration;

#[cfg(feature = "api")]
use crate::config::ServerConfig;

#[cfg(feature = "api")]
use crate::error::SoilError;

#[cfg(feature = "api")]
use crate::extraction::{ExtractionResponse, RawNutrient};

#[cfg(feature = "api")]
use crate::narrative::{
    CachedComments, CommentRequest, CommentSource, HttpCommentSource, TemplateCommentSource,
};

#[cfg(feature = "api")]
use crate::nutrients::{aggregate, CanonicalNutrient, NutrientReading};

#[cfg(feature = "api")]
use crate::report::{ExportFormat, ProductLists, ReportSession, SessionUpdate};

#[cfg(feature = "api")]
use crate::scorer::score_card;

#[cfg(feature = "api")]
use crate::thresholds::ThresholdConfig;

// ============================================================================
// Application State
// ============================================================================

#[cfg(feature = "api")]
#[derive(Clone)]
pub struct AppState {
    /// Generated section comments keyed by "comments:{report}:{paddock}"
    pub cache: Cache<String, serde_json::Value>,
    pub thresholds: Arc<ThresholdConfig>,
    /// Remote comment writer; `None` means template narratives only
    pub comment_source: Option<Arc<HttpCommentSource>>,
}

#[cfg(feature = "api")]
impl AppState {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        tracing::info!("Loading nutrient thresholds...");
        let thresholds = Arc::new(config.thresholds()?);

        tracing::info!("Initializing Moka cache...");
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        let comment_source = match &config.ai_backend_url {
            Some(url) => {
                tracing::info!("Section comments from {}", url);
                Some(Arc::new(HttpCommentSource::new(url.clone())))
            }
            None => {
                tracing::info!("No comment backend configured, using templates");
                None
            }
        };

        Ok(Self {
            cache,
            thresholds,
            comment_source,
        })
    }
}

#[cfg(feature = "api")]
fn comments_key(report_ref: &str, paddock: &str) -> String {
    format!("comments:{}:{}", report_ref, paddock)
}

// ============================================================================
// Router
// ============================================================================

#[cfg(feature = "api")]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Nutrient endpoints
        .route("/api/nutrients/aggregate", post(aggregate_nutrients))
        .route("/api/nutrients/score", post(score_nutrients))
        .route("/api/thresholds", get(get_thresholds))

        // Section comments
        .route("/generate-soil-comments", post(generate_soil_comments))
        .route(
            "/api/proxy/get-ai-comments/:id",
            put(store_comments).get(get_comments),
        )

        // Report export
        .route("/api/report", post(build_report))

        // Middleware (applied in reverse order)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Request Types
// ============================================================================

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
pub struct NutrientsRequest {
    #[serde(default)]
    pub nutrients: Vec<RawNutrient>,
}

#[cfg(feature = "api")]
impl NutrientsRequest {
    fn canonical(&self) -> Vec<CanonicalNutrient> {
        let readings: Vec<NutrientReading> = self.nutrients.iter().filter_map(RawNutrient::to_reading).collect();
        aggregate(&readings)
    }
}

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub key: String,
}

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

#[cfg(feature = "api")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub extraction: ExtractionResponse,
    #[serde(default)]
    pub session: SessionUpdate,
    #[serde(default)]
    pub products: Option<ProductLists>,
    /// Fill missing section texts before export
    #[serde(default)]
    pub generate_comments: bool,
    /// Report id under which comments were cached
    #[serde(default)]
    pub report_ref: Option<String>,
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

#[cfg(feature = "api")]
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Raw rows -> canonical nutrient list
#[cfg(feature = "api")]
async fn aggregate_nutrients(
    State(state): State<AppState>,
    Json(payload): Json<NutrientsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let nutrients = payload.canonical();
    let populated = nutrients.iter().filter(|n| !n.is_empty()).count();
    tracing::debug!("Aggregated {} rows into {} nutrients", payload.nutrients.len(), populated);

    let colors: Vec<_> = nutrients.iter().map(|n| state.thresholds.color_for(n)).collect();

    Ok(Json(serde_json::json!({
        "populated": populated,
        "nutrients": nutrients,
        "colors": colors,
    })))
}

/// Raw rows -> per-nutrient scores, overall score and stars
#[cfg(feature = "api")]
async fn score_nutrients(
    Json(payload): Json<NutrientsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let card = score_card(&payload.canonical());
    tracing::info!(
        "Scored {} nutrients: {:.1} ({} stars)",
        card.overall.scored_nutrients,
        card.overall.score,
        card.overall.stars
    );
    let value = serde_json::to_value(card).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(value))
}

#[cfg(feature = "api")]
async fn get_thresholds(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.thresholds.snapshot()))
}

/// Template writer with the same contract as the remote backend
#[cfg(feature = "api")]
async fn generate_soil_comments(
    Json(request): Json<CommentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let summary = TemplateCommentSource.generate(&request).await?;
    Ok(Json(serde_json::json!({ "summary": summary })))
}

#[cfg(feature = "api")]
async fn store_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CommentsQuery>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    if CachedComments::from_value(&body).is_none() {
        return Err(AppError::BadRequest("body holds no section comments".to_string()));
    }
    state.cache.insert(comments_key(&id, &params.key), body).await;
    tracing::debug!("Cached comments for {} / {}", id, params.key);
    Ok(Json(serde_json::json!({ "stored": true })))
}

#[cfg(feature = "api")]
async fn get_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CommentsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.cache.get(&comments_key(&id, &params.key)).await {
        Some(cached) => Ok(Json(cached)),
        None => Err(AppError::NotFound(format!(
            "No comments for report {} paddock {}",
            id, params.key
        ))),
    }
}

/// Local cache first, then the remote comment store when one is configured
#[cfg(feature = "api")]
async fn cached_comments(state: &AppState, report_ref: &str, paddock: &str) -> Option<CachedComments> {
    let key = comments_key(report_ref, paddock);
    if let Some(value) = state.cache.get(&key).await {
        return CachedComments::from_value(&value);
    }

    let remote = state.comment_source.as_ref()?;
    match remote.fetch_cached(report_ref, paddock).await {
        Ok(Some(found)) => {
            tracing::debug!("Remote cache hit: {}", key);
            state.cache.insert(key, found.to_value()).await;
            Some(found)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Cached comment lookup failed for {}: {}", key, e);
            None
        }
    }
}

/// Extraction + session fields -> rendered report (JSON by default)
#[cfg(feature = "api")]
async fn build_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    Json(payload): Json<ReportRequest>,
) -> Result<Response, AppError> {
    let format = match query.format.as_deref() {
        None => ExportFormat::Json,
        Some(text) => ExportFormat::parse(text)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown format '{}'", text)))?,
    };

    let mut session = ReportSession::new(state.thresholds.as_ref().clone());
    session.load(&payload.extraction)?;
    session.update(payload.session)?;
    if let Some(products) = payload.products {
        session.products = products;
    }

    if payload.generate_comments {
        let paddock = session.selected_paddock().map(|p| p.name.clone());
        let cached = match (&payload.report_ref, &paddock) {
            (Some(report_ref), Some(paddock)) => {
                cached_comments(&state, report_ref, paddock).await
            }
            _ => None,
        };

        let template = TemplateCommentSource;
        let source: &dyn CommentSource = match &state.comment_source {
            Some(remote) => remote.as_ref(),
            None => &template,
        };
        let result = session.generate_comments(source, cached.as_ref()).await?;
        if let Some(warning) = result.warning() {
            tracing::warn!("{}", warning);
        }
    }

    let rendered = session.export(format)?;
    let content_type = match format {
        ExportFormat::Markdown => "text/markdown; charset=utf-8",
        ExportFormat::Json => "application/json",
    };
    Ok(([(header::CONTENT_TYPE, content_type)], rendered).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[cfg(feature = "api")]
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

#[cfg(feature = "api")]
impl From<SoilError> for AppError {
    fn from(err: SoilError) -> Self {
        match err {
            SoilError::InvalidInput(_) | SoilError::Parse { .. } | SoilError::Json(_) => {
                AppError::BadRequest(err.to_string())
            }
            SoilError::Busy(_) => AppError::Conflict(err.to_string()),
            SoilError::Remote(_) | SoilError::Io(_) | SoilError::Table(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(feature = "api")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
