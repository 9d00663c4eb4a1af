use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::forecast::{AuthorityDelta, ForecastFilter, ForecastRow, PivotSeries, PivotTable, Year};
use crate::services::{ChartRequest, ChartView, ForecastService, ServiceError, TableSummary};

#[derive(Clone)]
pub struct AppState {
    pub forecast_service: ForecastService,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Body returned for every failed request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind, e.g. `malformed_layout`
    pub error: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ForecastQuery {
    /// Exact indicator name
    pub indicator: Option<String>,
    /// Exact authority name
    pub authority: Option<String>,
    /// First year, inclusive
    #[param(value_type = Option<f64>)]
    pub from: Option<Year>,
    /// Last year, inclusive
    #[param(value_type = Option<f64>)]
    pub to: Option<Year>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChartQuery {
    /// Indicator to chart (defaults to the first in sort order)
    pub indicator: Option<String>,
    /// Comma-separated authorities (defaults to all reporting the indicator)
    pub authorities: Option<String>,
    /// First year, inclusive (defaults to the earliest available)
    #[param(value_type = Option<f64>)]
    pub from: Option<Year>,
    /// Last year, inclusive (defaults to the latest available)
    #[param(value_type = Option<f64>)]
    pub to: Option<Year>,
}

impl From<ForecastQuery> for ForecastFilter {
    fn from(query: ForecastQuery) -> Self {
        let years = match (query.from, query.to) {
            (None, None) => None,
            (from, to) => Some(from.unwrap_or(Year::MIN)..=to.unwrap_or(Year::MAX)),
        };

        ForecastFilter {
            indicator: query.indicator,
            authorities: query.authority.map(|a| vec![a]),
            years,
        }
    }
}

impl From<ChartQuery> for ChartRequest {
    fn from(query: ChartQuery) -> Self {
        ChartRequest {
            indicator: query.indicator,
            authorities: query.authorities.map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            from: query.from,
            to: query.to,
        }
    }
}

/// Maps service failures to status codes with a readable body, so a front end
/// can show why nothing was loaded instead of rendering an empty chart.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            ServiceError::Load(e) => (StatusCode::SERVICE_UNAVAILABLE, e.kind()),
            ServiceError::EmptyTable => (StatusCode::SERVICE_UNAVAILABLE, "empty_table"),
            ServiceError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ServiceError::UnknownIndicator(_) => (StatusCode::NOT_FOUND, "unknown_indicator"),
            ServiceError::InvalidYearRange { .. } => (StatusCode::BAD_REQUEST, "invalid_year_range"),
            ServiceError::Pivot(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ambiguous_pivot"),
        };

        let message = self.0.to_string();
        if status.is_server_error() {
            error!("Request failed ({}): {}", kind, message);
        } else {
            warn!("Request rejected ({}): {}", kind, message);
        }

        let body = ErrorResponse {
            error: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_summary,
        get_forecasts,
        get_indicators,
        get_authorities,
        get_chart,
        reload
    ),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        ForecastRow,
        Year,
        TableSummary,
        ChartView,
        PivotTable,
        PivotSeries,
        AuthorityDelta
    )),
    tags(
        (name = "health", description = "Service status"),
        (name = "forecasts", description = "Normalized forecast table and chart views")
    )
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/summary", get(get_summary))
        .route("/forecasts", get(get_forecasts))
        .route("/indicators", get(get_indicators))
        .route("/indicators/{indicator}/authorities", get(get_authorities))
        .route("/chart", get(get_chart))
        .route("/reload", post(reload))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/summary",
    tag = "forecasts",
    responses(
        (status = 200, description = "Size and span of the loaded table", body = TableSummary),
        (status = 503, description = "Forecasts could not be loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_summary(State(state): State<AppState>) -> Result<Json<TableSummary>, ApiError> {
    let summary = state.forecast_service.summary().await?;
    debug!("Table has {} rows", summary.rows);
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/forecasts",
    tag = "forecasts",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Matching forecast rows", body = [ForecastRow]),
        (status = 503, description = "Forecasts could not be loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_forecasts(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Vec<ForecastRow>>, ApiError> {
    let filter = ForecastFilter::from(query);
    let rows = state.forecast_service.filtered(&filter).await?;
    info!("Returning {} forecast rows", rows.len());
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/api/v1/indicators",
    tag = "forecasts",
    responses(
        (status = 200, description = "Sorted distinct indicators", body = [String]),
        (status = 503, description = "Forecasts could not be loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_indicators(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let indicators = state.forecast_service.indicators().await?;
    debug!("Found {} indicators", indicators.len());
    Ok(Json(indicators))
}

#[utoipa::path(
    get,
    path = "/api/v1/indicators/{indicator}/authorities",
    tag = "forecasts",
    params(("indicator" = String, Path, description = "Indicator name")),
    responses(
        (status = 200, description = "Sorted authorities publishing the indicator", body = [String]),
        (status = 404, description = "Indicator not found", body = ErrorResponse),
        (status = 503, description = "Forecasts could not be loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(indicator = %indicator))]
async fn get_authorities(
    State(state): State<AppState>,
    Path(indicator): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let authorities = state.forecast_service.authorities(&indicator).await?;
    debug!("{} authorities publish {}", authorities.len(), indicator);
    Ok(Json(authorities))
}

#[utoipa::path(
    get,
    path = "/api/v1/chart",
    tag = "forecasts",
    params(ChartQuery),
    responses(
        (status = 200, description = "Year x authority series and deltas", body = ChartView),
        (status = 400, description = "Year range is reversed", body = ErrorResponse),
        (status = 404, description = "Indicator not found", body = ErrorResponse),
        (status = 422, description = "Several values for one year and authority", body = ErrorResponse),
        (status = 503, description = "Forecasts could not be loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartView>, ApiError> {
    let request = ChartRequest::from(query);
    let view = state.forecast_service.chart(&request).await?;
    info!(
        "Chart for {} with {} authorities ({:?}-{:?})",
        view.indicator,
        view.authorities.len(),
        view.from,
        view.to
    );
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/v1/reload",
    tag = "forecasts",
    responses(
        (status = 200, description = "Source parsed again", body = TableSummary),
        (status = 503, description = "Forecasts could not be loaded", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn reload(State(state): State<AppState>) -> Result<Json<TableSummary>, ApiError> {
    let summary = state.forecast_service.reload().await?;
    info!("Reloaded {} forecast rows", summary.rows);
    Ok(Json(summary))
}
