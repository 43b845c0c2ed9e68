use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data_models::{DEFAULT_MAX_RESULTS, ExtractionResult};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Raw query string; numbers are validated by the handler so bad input maps
/// to a JSON 400 instead of a bare rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ResultsParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub status: &'static str,
    pub term: String,
    pub max_results: usize,
    pub backend: &'static str,
    pub extracted: usize,
    pub results: Vec<ExtractionResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub path: &'static str,
    pub method: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub backend: &'static str,
    pub store: &'static str,
    pub endpoints: Vec<EndpointInfo>,
    pub last_extraction: Option<DateTime<Utc>>,
}
