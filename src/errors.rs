use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Bad request error (missing or malformed input).
    BadRequest(String),
    /// No API key was presented.
    Unauthorized(String),
    /// An API key was presented but it is not one of ours.
    Forbidden(String),
    /// Error interacting with an external API (transport, decoding, missing token).
    ExternalApiError(String),
    /// External API answered with a non-success status; the body is kept verbatim.
    UpstreamResponse {
        /// HTTP status returned upstream.
        status: u16,
        /// Decoded JSON body, or the raw text as a JSON string.
        body: Value,
    },
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message, surfaced to the caller as `message`.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::UpstreamResponse { status, body } => {
                write!(f, "Upstream returned {}: {}", status, body)
            }
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Diagnostic payload handed back to callers in the `error` field.
    ///
    /// Upstream bodies are preserved as-is; everything else becomes its message.
    pub fn payload(&self) -> Value {
        match self {
            AppError::UpstreamResponse { body, .. } => body.clone(),
            AppError::ExternalApiError(msg) => Value::String(msg.clone()),
            AppError::WithContext { source, .. } => source.payload(),
            other => Value::String(other.to_string()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ExternalApiError(_)
            | AppError::UpstreamResponse { .. }
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::WithContext { source, .. } => source.status(),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into the `{success:false, message, error?}` shape the
    /// chat flows branch on.
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::BadRequest(msg) => json!({ "success": false, "message": msg }),
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                json!({ "success": false, "message": msg })
            }
            AppError::Forbidden(msg) => {
                tracing::warn!("Forbidden access: {}", msg);
                json!({ "success": false, "message": msg })
            }
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                json!({ "success": false, "message": "Error en servicio externo", "error": msg })
            }
            AppError::UpstreamResponse { status, body } => {
                tracing::error!("Upstream returned {}: {}", status, body);
                json!({ "success": false, "message": "Error en servicio externo", "error": body })
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({ "success": false, "message": "Error interno del servidor" })
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                json!({ "success": false, "message": context, "error": source.payload() })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}
