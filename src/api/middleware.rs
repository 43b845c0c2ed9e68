use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::AppState;
use super::error::ApiError;
use crate::auth::{AuthError, parse_bearer};

/// Rejects the request with 401 unless it carries a valid bearer token.
/// The verified claims are handed to handlers through request extensions.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .ok_or(AuthError::MissingToken)?;

    let claims = state.tokens.verify(token).inspect_err(|e| {
        debug!(path = %req.uri().path(), "rejected token: {e:?}");
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
