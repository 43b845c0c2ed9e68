use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, header},
};
use chrono::Utc;
use tracing::info;

use crate::auth::{AuthError, parse_basic_credentials};
use crate::data_models::{
    DEFAULT_LIMIT, DEFAULT_PAGE, Pagination, ResultPage, ResultQuery, SearchQuery,
    ValidationError,
};

use super::AppState;
use super::error::ApiError;
use super::models::{
    EndpointInfo, ExtractRequest, ExtractResponse, HealthResponse, InfoResponse, ResultsParams,
    TokenRequest, TokenResponse,
};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

pub async fn api_info(State(state): State<AppState>) -> Result<Json<InfoResponse>, ApiError> {
    let last_extraction = state.store.last_updated().await?;

    Ok(Json(InfoResponse {
        name: "Sura Scraper API",
        version: env!("CARGO_PKG_VERSION"),
        description: "API para extraer y consultar datos de seguros.sura.cl",
        backend: state.extractor.backend(),
        store: state.store.name(),
        endpoints: vec![
            EndpointInfo {
                path: "/health",
                method: "GET",
                description: "Verificar estado del servicio",
            },
            EndpointInfo {
                path: "/api/info",
                method: "GET",
                description: "Obtener información de la API",
            },
            EndpointInfo {
                path: "/api/auth/token",
                method: "POST",
                description: "Obtener token de acceso",
            },
            EndpointInfo {
                path: "/api/results",
                method: "GET",
                description: "Obtener resultados de extracción",
            },
            EndpointInfo {
                path: "/api/extract",
                method: "POST",
                description: "Ejecutar extracción de datos",
            },
        ],
        last_extraction,
    }))
}

/// Credentials come from a Basic auth header or, failing that, a JSON body.
pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_credentials);

    let (username, password) = match basic {
        Some(credentials) => credentials,
        None => {
            let request: TokenRequest =
                serde_json::from_slice(&body).map_err(|_| AuthError::MissingCredentials)?;
            (request.username, request.password)
        }
    };

    let token = state.tokens.issue(&username, &password)?;
    info!(user = %username, "issued access token");

    Ok(Json(TokenResponse {
        access_token: token.access_token,
        token_type: "Bearer",
        expires_at: token.expires_at,
    }))
}

pub async fn list_results(
    State(state): State<AppState>,
    Query(params): Query<ResultsParams>,
) -> Result<Json<ResultPage>, ApiError> {
    let page = parse_number("page", params.page.as_deref(), DEFAULT_PAGE as i64)?;
    let limit = parse_number("limit", params.limit.as_deref(), DEFAULT_LIMIT as i64)?;
    let query = ResultQuery::new(params.q.as_deref(), Pagination::new(page, limit)?);

    let results = state.store.query(&query).await?;
    Ok(Json(results))
}

pub async fn trigger_extraction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExtractResponse>, ApiError> {
    let request: ExtractRequest = serde_json::from_slice(&body)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
    let query = SearchQuery::new(
        request.term.as_deref().unwrap_or_default(),
        request.max_results,
        request.headless,
    )?;

    let report = state.extractor.extract(&query).await?;

    Ok(Json(ExtractResponse {
        status: "completed",
        term: report.term,
        max_results: report.requested,
        backend: report.backend,
        extracted: report.records.len(),
        results: report.records,
    }))
}

fn parse_number(
    field: &'static str,
    raw: Option<&str>,
    default: i64,
) -> Result<i64, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ValidationError::OutOfRange {
            field,
            expected: "an integer",
            value: value.to_string(),
        }),
    }
}
