//! Router assembly shared by the server binary and the integration tests.

use crate::{auth, docs, errors::AppError, handlers, handlers::AppState};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorError,
    GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Chat payloads are small; 1 MiB is far above any real flow.
const MAX_BODY_BYTES: usize = 1024 * 1024;

const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again in a moment.";

/// Full router without rate limiting.
pub fn router(state: Arc<AppState>) -> Router {
    let api = salesforce_routes(&state);
    with_public_routes(api, state)
}

/// Router with the per-IP limit of `MAX_REQUESTS_PER_MIN` on the Salesforce
/// routes. Needs `into_make_service_with_connect_info::<SocketAddr>()` when no
/// proxy header carries the client address.
pub fn rate_limited_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let per_minute = state.config.max_requests_per_min;
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_interval_ms(per_minute))
            .burst_size(per_minute)
            .key_extractor(SmartIpKeyExtractor)
            .error_handler(rate_limit_response)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit: {} requests/min", per_minute))?,
    );

    let api = salesforce_routes(&state).layer(GovernorLayer {
        config: governor_conf,
    });
    Ok(with_public_routes(api, state))
}

/// One token every `60s / per_minute`, never faster than one per millisecond.
fn replenish_interval_ms(per_minute: u32) -> u64 {
    (60_000 / u64::from(per_minute.max(1))).max(1)
}

/// Rejections keep the `{success, message}` shape the chat flows branch on.
fn rate_limit_response(error: GovernorError) -> Response {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!("Rate limit exceeded, retry in {}s", wait_time);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "success": false, "message": RATE_LIMIT_MESSAGE })),
            )
                .into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::InternalError("Unable to identify the client address".to_string())
                .into_response()
        }
        GovernorError::Other { code, msg, .. } => (
            code,
            Json(json!({ "success": false, "message": msg.unwrap_or_default() })),
        )
            .into_response(),
    }
}

fn salesforce_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/duplicates", post(handlers::search_duplicates))
        .route("/create", post(handlers::create_opportunity))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
}

fn with_public_routes(api: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/docs", get(docs::serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(docs::serve_openapi_spec))
        .nest("/api/salesforce", api)
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
