use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::landbot_models::{
    CreateResponse, DuplicatesRequest, DuplicatesResponse, OpportunityPayload,
};
use crate::services::{DuplicatesService, OpportunityService};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Duplicate search and scenario classification.
    pub duplicates: DuplicatesService,
    /// Composite creation of accounts, contacts, opportunities and quotes.
    pub opportunities: OpportunityService,
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/salesforce/duplicates
///
/// Receives `{numDocumento}` or `{cif}` from the chat flow and answers with the
/// scenario (`MAI_composer_type_sf`) and the reference account
/// (`MAI_accountid_callback_sf`) the flow must send back on create.
///
/// # Returns
///
/// * `Result<Json<DuplicatesResponse>, AppError>` - The scenario or an error.
pub async fn search_duplicates(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DuplicatesRequest>, JsonRejection>,
) -> Result<Json<DuplicatesResponse>, AppError> {
    let Json(request) = payload?;

    let document = request.document().ok_or_else(|| {
        AppError::BadRequest("Falta DNI/CIF para verificar duplicados.".to_string())
    })?;
    tracing::info!("POST /duplicates - document: {}", document);

    let response = state
        .duplicates
        .check_duplicates(&document)
        .await
        .context("Error interno al buscar duplicados")?;

    Ok(Json(response))
}

/// POST /api/salesforce/create
///
/// Creates the Salesforce records for the scenario in `MAI_composer_type_sf`.
/// Salesforce-side rejections are answered with 200 and `success: false`.
///
/// # Returns
///
/// * `Result<Json<CreateResponse>, AppError>` - The creation result or an error.
pub async fn create_opportunity(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OpportunityPayload>, JsonRejection>,
) -> Result<Json<CreateResponse>, AppError> {
    let Json(payload) = payload?;
    tracing::info!(
        "POST /create - scenario: '{}', account: {:?}",
        payload.composer_type(),
        payload.account_id_callback.as_ref().map(|a| a.as_str())
    );

    let response = state
        .opportunities
        .create_opportunity(&payload)
        .await
        .context("Error interno al crear oportunidad")?;

    Ok(Json(response))
}
