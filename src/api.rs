//! HTTP surface: health, search, and the OpenAPI document behind Swagger UI.
//!
//! Every failure leaves as an [`ErrorResponse`], including bodies axum could
//! not decode.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::degrade::is_diagnostic;
use crate::dispatcher::Dispatcher;
use crate::error::ScrapeError;
use crate::listing::{Availability, Listing};
use crate::sources::{SourceId, UnknownSource};

const DEFAULT_SOURCE: &str = "emex";
const VIN_LEN: usize = 17;
const MIN_PART_NAME: usize = 2;

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, search),
    components(schemas(
        HealthResponse,
        SearchRequest,
        SearchParams,
        SearchResponse,
        ErrorResponse,
        Listing,
        Availability,
        SourceId
    )),
    tags((name = "parts", description = "Auto-parts search across storefronts"))
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/api/search", post(search))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// The shared browser answers pings
    pub browser_ready: bool,
    pub timestamp: String,
}

/// What the user asked for; echoed back in the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchParams {
    /// `vin`, `params`, or anything else for a plain part-name search
    pub mode: Option<String>,
    pub vin: Option<String>,
    #[serde(default)]
    pub part_name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub engine: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// `emex` (default), `rulim` or `spartex`
    pub source: Option<String>,
    #[serde(flatten)]
    pub params: SearchParams,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    pub source: SourceId,
    pub results: Vec<Listing>,
    pub total: usize,
    pub message: String,
    pub search_params: SearchParams,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Payload(#[from] JsonRejection),
    #[error(transparent)]
    UnknownSource(#[from] UnknownSource),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Payload(rejection) => {
                (rejection.status(), "Некорректное тело запроса".to_string())
            }
            ApiError::UnknownSource(_) => (StatusCode::NOT_FOUND, "Неизвестный источник".to_string()),
            ApiError::Scrape(ScrapeError::Timeout { .. }) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Время ожидания ответа от источника истекло".to_string(),
            ),
            ApiError::Scrape(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Ошибка при выполнении поиска".to_string(),
            ),
        };
        let error = match &self {
            ApiError::Validation(_) => None,
            other => Some(other.to_string()),
        };
        (
            status,
            Json(ErrorResponse {
                success: false,
                message,
                error,
            }),
        )
            .into_response()
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.part_name.trim().chars().count() < MIN_PART_NAME {
            return Err(ApiError::Validation(
                "Название детали должно содержать минимум 2 символа".to_string(),
            ));
        }
        if self.mode.as_deref() == Some("vin") {
            let vin_len = self.vin.as_deref().map(|v| v.trim().chars().count()).unwrap_or(0);
            if vin_len != VIN_LEN {
                return Err(ApiError::Validation(
                    "VIN должен содержать ровно 17 символов".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The free-text query handed to the adapter.
    pub fn query(&self) -> String {
        let part = self.part_name.trim();
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match self.mode.as_deref() {
            Some("vin") => match present(&self.vin) {
                Some(vin) => format!("{} {}", vin, part),
                None => part.to_string(),
            },
            Some("params") if present(&self.brand).is_some() && present(&self.model).is_some() => {
                [&self.brand, &self.model, &self.year, &self.engine]
                    .into_iter()
                    .filter_map(present)
                    .chain(std::iter::once(part.to_string()))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            _ => part.to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "parts",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        browser_ready: state.dispatcher.browser_ready().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    post,
    path = "/api/search",
    tag = "parts",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Listings, or one diagnostic listing", body = SearchResponse),
        (status = 400, description = "Invalid search parameters", body = ErrorResponse),
        (status = 404, description = "Unknown source", body = ErrorResponse),
        (status = 503, description = "Browser unavailable", body = ErrorResponse),
        (status = 504, description = "Search budget exhausted", body = ErrorResponse)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let started = Instant::now();
    let Json(req) = payload?;
    req.params.validate()?;
    let source = state
        .dispatcher
        .source(req.source.as_deref().unwrap_or(DEFAULT_SOURCE))?;
    let query = req.params.query();

    info!("📥 search request: source={} query={:?}", source, query);

    let results = state.dispatcher.search(source, &query).await.map_err(|e| {
        error!("❌ {} search failed: {}", source, e);
        ApiError::from(e)
    })?;

    let message = if results.iter().all(is_diagnostic) {
        "Товары не найдены"
    } else {
        "Поиск выполнен успешно"
    };
    let duration_ms = started.elapsed().as_millis() as u64;
    info!("✅ search finished in {}ms, {} listings", duration_ms, results.len());

    Ok(Json(SearchResponse {
        success: true,
        source,
        total: results.len(),
        results,
        message: message.to_string(),
        search_params: req.params,
        duration_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: Option<&str>, part: &str) -> SearchParams {
        SearchParams {
            mode: mode.map(str::to_string),
            part_name: part.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_part_name_validation() {
        assert!(params(None, " a ").validate().is_err());
        assert!(params(None, "ab").validate().is_ok());
        assert!(params(None, "фи").validate().is_ok());
    }

    #[test]
    fn test_vin_validation() {
        let mut p = params(Some("vin"), "фильтр");
        assert!(p.validate().is_err());
        p.vin = Some("WVWZZZ1JZXW00000".to_string());
        assert!(p.validate().is_err());
        p.vin = Some("WVWZZZ1JZXW000001".to_string());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_query_assembly() {
        let mut p = params(Some("vin"), "фильтр масляный");
        p.vin = Some("WVWZZZ1JZXW000001".to_string());
        assert_eq!(p.query(), "WVWZZZ1JZXW000001 фильтр масляный");

        let mut p = params(Some("params"), "колодки");
        p.brand = Some("Toyota".to_string());
        p.model = Some("Camry".to_string());
        p.engine = Some(" 2AR-FE ".to_string());
        p.year = Some("".to_string());
        assert_eq!(p.query(), "Toyota Camry 2AR-FE колодки");

        // params mode without a model falls back to the part name
        p.model = None;
        assert_eq!(p.query(), "колодки");

        assert_eq!(params(None, "  свеча  ").query(), "свеча");
    }

    #[test]
    fn test_request_wire_shape() {
        let req: SearchRequest = serde_json::from_str(
            r#"{"source":"rulim","mode":"params","part_name":"фильтр","brand":"Kia","model":"Rio"}"#,
        )
        .unwrap();
        assert_eq!(req.source.as_deref(), Some("rulim"));
        assert_eq!(req.params.brand.as_deref(), Some("Kia"));
        assert_eq!(req.params.query(), "Kia Rio фильтр");
    }

    #[test]
    fn test_error_status_codes() {
        let status = |e: ApiError| e.into_response().status();
        assert_eq!(status(ApiError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ApiError::UnknownSource(UnknownSource("ebay".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ApiError::Scrape(ScrapeError::DriverUnavailable)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(ApiError::Scrape(ScrapeError::session("gone"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
