// County Market - Web Server
// REST API with Axum over the metrics engine

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use county_market::{
    AggregateRow, AppConfig, DirectoryFilter, ErrorKind, FactStore, MarketEngine, MarketError, Page,
    SqliteFactStore, YearMonth,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
struct AppState<S: FactStore> {
    engine: Arc<MarketEngine<S>>,
    default_page_size: u32,
}

impl<S: FactStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            default_page_size: self.default_page_size,
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Engine error rendered as an HTTP response
struct ApiError(MarketError);

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Schema | ErrorKind::Internal => {
                error!("request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Deserialize)]
struct PageParams {
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct DateRangeResponse {
    earliest: YearMonth,
    latest: YearMonth,
}

/// Path segment → county id, rejected in the API's own error body.
fn parse_county_id(raw: &str) -> Result<i64, MarketError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| MarketError::validation(format!("'{}' is not a county id", raw)))
}

/// Parse an id list like "(1001,1003)" or "1001,1003". "()" is an empty list.
fn parse_id_list(raw: &str) -> Result<Vec<i64>, MarketError> {
    let inner = raw.trim().trim_start_matches('(').trim_end_matches(')');

    inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_county_id)
        .collect()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /county_metrics/:id - Monthly history for one county
async fn county_metrics<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<county_market::MetricRecord>> {
    let id = parse_county_id(&id)?;
    Ok(Json(ApiResponse::ok(state.engine.time_series(id)?)))
}

/// GET /county_scores/:id - Hotness/supply/demand/viewers over time
async fn county_scores<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<county_market::ScoreRecord>> {
    let id = parse_county_id(&id)?;
    Ok(Json(ApiResponse::ok(state.engine.score_series(id)?)))
}

/// GET /county_name/:id - Raw county name
async fn county_name<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    let id = parse_county_id(&id)?;
    Ok(Json(ApiResponse::ok(state.engine.county_name(id)?)))
}

/// GET /all_time_county_info/:id - [Average, Maximum, Minimum]
async fn all_time_county_info<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<AggregateRow>> {
    let id = parse_county_id(&id)?;
    let summary = state.engine.summarize(id)?;
    Ok(Json(ApiResponse::ok(vec![
        summary.average,
        summary.maximum,
        summary.minimum,
    ])))
}

/// GET /average_county_info/:id
async fn average_county_info<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<AggregateRow> {
    let id = parse_county_id(&id)?;
    Ok(Json(ApiResponse::ok(state.engine.summarize(id)?.average)))
}

/// GET /maximum_county_info/:id
async fn maximum_county_info<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<AggregateRow> {
    let id = parse_county_id(&id)?;
    Ok(Json(ApiResponse::ok(state.engine.summarize(id)?.maximum)))
}

/// GET /minimum_county_info/:id
async fn minimum_county_info<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<AggregateRow> {
    let id = parse_county_id(&id)?;
    Ok(Json(ApiResponse::ok(state.engine.summarize(id)?.minimum)))
}

/// GET /county_metrics_by_date/:ids/:date - Favorites compared at one month
async fn county_metrics_by_date<S: FactStore>(
    State(state): State<AppState<S>>,
    Path((ids, date)): Path<(String, String)>,
) -> ApiResult<Vec<county_market::ComparisonRow>> {
    let ids = parse_id_list(&ids)?;
    let date: YearMonth = date.parse()?;
    Ok(Json(ApiResponse::ok(state.engine.at_date(&ids, date)?)))
}

/// GET /counties_starting_with/:letter - Directory tab
async fn counties_starting_with<S: FactStore>(
    State(state): State<AppState<S>>,
    Path(letter): Path<String>,
) -> ApiResult<Vec<county_market::CountyIdentity>> {
    let filter: DirectoryFilter = letter.parse()?;
    Ok(Json(ApiResponse::ok(state.engine.by_prefix(filter)?)))
}

/// GET /search_counties?name= - Name fragment search
async fn search_counties<S: FactStore>(
    State(state): State<AppState<S>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<county_market::CountyIdentity>> {
    Ok(Json(ApiResponse::ok(state.engine.search(&params.name)?)))
}

/// GET /latest_county_info?page=&page_size= - Latest month for every county
async fn latest_county_info<S: FactStore>(
    State(state): State<AppState<S>>,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<county_market::SnapshotRow>> {
    let page = Page::new(
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(state.default_page_size),
    );
    Ok(Json(ApiResponse::ok(state.engine.latest_snapshot(page)?)))
}

/// GET /date_range - Earliest and latest month available
async fn date_range<S: FactStore>(State(state): State<AppState<S>>) -> ApiResult<DateRangeResponse> {
    let (earliest, latest) = state.engine.date_range()?;
    Ok(Json(ApiResponse::ok(DateRangeResponse { earliest, latest })))
}

fn build_router<S: FactStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/county_metrics/:id", get(county_metrics::<S>))
        .route("/county_scores/:id", get(county_scores::<S>))
        .route("/county_name/:id", get(county_name::<S>))
        .route("/all_time_county_info/:id", get(all_time_county_info::<S>))
        .route("/average_county_info/:id", get(average_county_info::<S>))
        .route("/maximum_county_info/:id", get(maximum_county_info::<S>))
        .route("/minimum_county_info/:id", get(minimum_county_info::<S>))
        .route(
            "/county_metrics_by_date/:ids/:date",
            get(county_metrics_by_date::<S>),
        )
        .route(
            "/counties_starting_with/:letter",
            get(counties_starting_with::<S>),
        )
        .route("/search_counties", get(search_counties::<S>))
        .route("/latest_county_info", get(latest_county_info::<S>))
        .route("/date_range", get(date_range::<S>))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(None).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    println!("🌐 County Market - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !config.database_path.exists() {
        eprintln!("❌ Database not found at {:?}", config.database_path);
        eprintln!("   Run: county-market import --counties <csv> --metrics <csv>");
        std::process::exit(1);
    }

    let store = SqliteFactStore::open(&config.database_path).context("Failed to open database")?;
    info!(path = ?config.database_path, "database opened");

    let state = AppState {
        engine: Arc::new(MarketEngine::new(store).with_max_page_size(config.max_page_size)),
        default_page_size: config.default_page_size,
    };
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/county_metrics/<id>", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
