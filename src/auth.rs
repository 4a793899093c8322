use crate::errors::AppError;
use crate::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// API key check for the chat platforms (Magick and Landbot).
///
/// The key travels in the `x-api-key` header or the `api_key` query parameter.
/// Missing key: 401. Key not configured: 403.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sent = api_key_from(request.headers(), request.uri().query())
        .ok_or_else(|| AppError::Unauthorized("API Key is required".to_string()))?;

    if !state
        .config
        .api_keys
        .iter()
        .any(|key| constant_time_compare(&sent, key))
    {
        return Err(AppError::Forbidden("Invalid API Key".to_string()));
    }

    Ok(next.run(request).await)
}

fn api_key_from(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        url::form_urlencoded::parse(query?.as_bytes())
            .find(|(name, _)| name == "api_key")
            .map(|(_, value)| value.into_owned())
            .filter(|v| !v.is_empty())
    })
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
