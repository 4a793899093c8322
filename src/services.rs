use crate::audit_log::{AuditLog, AuditStream};
use crate::composite::{interpret_response, CompositeBuilder};
use crate::errors::AppError;
use crate::landbot_models::{CreateResponse, DuplicatesResponse, OpportunityPayload};
use crate::salesforce_client::SalesforceClient;
use crate::scenario::{self, Scenario};
use serde::Serialize;
use serde_json::Value;

const OPEN_OPPORTUNITY_MESSAGE: &str =
    "Ya existe un cliente con oportunidad abierta. No se puede crear.";
const DUPLICATES_TOKEN_ERROR: &str = "No se pudo obtener token de Salesforce para duplicados";
const CREATE_TOKEN_ERROR: &str = "No se pudo obtener token de Salesforce";

/// Audit record of a duplicate search that never produced a scenario.
#[derive(Debug, Serialize)]
struct DuplicatesFailure<'a> {
    success: bool,
    message: &'a str,
    error: Value,
    #[serde(rename = "docParaDuplicados")]
    document: &'a str,
}

/// Token → lookup → classify.
#[derive(Clone)]
pub struct DuplicatesService {
    client: SalesforceClient,
    audit: AuditLog,
}

impl DuplicatesService {
    pub fn new(client: SalesforceClient, audit: AuditLog) -> Self {
        Self { client, audit }
    }

    /// Looks the document up and tells the flow which scenario applies.
    ///
    /// An open opportunity is a modeled outcome (`success: false`), not an
    /// error. Token and lookup failures are audited and returned as errors.
    pub async fn check_duplicates(&self, document: &str) -> Result<DuplicatesResponse, AppError> {
        let token = match self.client.fetch_access_token(DUPLICATES_TOKEN_ERROR).await {
            Ok(token) => token,
            Err(e) => {
                self.audit_failure(DUPLICATES_TOKEN_ERROR, &e, document);
                return Err(e);
            }
        };

        let lookup = match self.client.search_duplicates(&token, document).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::error!("Duplicate lookup failed for {}: {}", document, e);
                self.audit_failure("Error consultando duplicados en SF", &e, document);
                return Err(AppError::ExternalApiError(
                    "Error consultando duplicados en Salesforce".to_string(),
                ));
            }
        };

        let classification = scenario::classify(&lookup);
        tracing::info!(
            "Duplicates for {}: scenario={}, account_id={:?}",
            document,
            classification.scenario,
            classification.account_id
        );

        let response = if classification.scenario.allows_creation() {
            DuplicatesResponse {
                success: true,
                message: "OK. No hay oportunidad abierta, puedes continuar.".to_string(),
                composer_type: classification.scenario,
                account_id_callback: classification.account_id,
                sf_raw: lookup,
            }
        } else {
            DuplicatesResponse {
                success: false,
                message: OPEN_OPPORTUNITY_MESSAGE.to_string(),
                composer_type: classification.scenario,
                account_id_callback: classification.account_id,
                sf_raw: lookup,
            }
        };

        self.audit.record(AuditStream::Duplicates, &response);
        Ok(response)
    }

    fn audit_failure(&self, message: &str, error: &AppError, document: &str) {
        self.audit.record(
            AuditStream::Duplicates,
            &DuplicatesFailure {
                success: false,
                message,
                error: error.payload(),
                document,
            },
        );
    }
}

/// Token → build → submit → interpret.
#[derive(Clone)]
pub struct OpportunityService {
    client: SalesforceClient,
    audit: AuditLog,
    builder: CompositeBuilder,
}

impl OpportunityService {
    pub fn new(client: SalesforceClient, audit: AuditLog) -> Self {
        let builder = CompositeBuilder::new(client.api_version());
        Self {
            client,
            audit,
            builder,
        }
    }

    /// Creates the records the payload's scenario calls for.
    ///
    /// The token is fetched before anything else, so a token failure is an
    /// `Err` for every payload. Every Salesforce-side problem after that comes
    /// back as a `success: false` response.
    pub async fn create_opportunity(
        &self,
        payload: &OpportunityPayload,
    ) -> Result<CreateResponse, AppError> {
        let token = match self.client.fetch_access_token(CREATE_TOKEN_ERROR).await {
            Ok(token) => token,
            Err(e) => {
                self.finish(CreateResponse {
                    error: Some(e.payload()),
                    ..CreateResponse::failure(CREATE_TOKEN_ERROR)
                });
                return Err(e);
            }
        };

        let composer_type = payload.composer_type();

        if composer_type == Scenario::OpportunityOpen.as_str() {
            return Ok(self.finish(CreateResponse::failure(OPEN_OPPORTUNITY_MESSAGE)));
        }

        let Some(composite) = self.builder.build(payload) else {
            if !composer_type.is_empty() {
                tracing::warn!("Unknown scenario tag '{}', nothing to create", composer_type);
            }
            return Ok(self.finish(CreateResponse::success(
                "No se procede a crear nada en Salesforce.",
            )));
        };

        let response = match self.client.submit_composite(&token, &composite).await {
            Ok(sf_data) => interpret_response(sf_data),
            Err(e) => {
                tracing::error!("Composite submission failed: {}", e);
                CreateResponse {
                    error: Some(e.payload()),
                    ..CreateResponse::failure("Error al enviar composite a Salesforce")
                }
            }
        };

        if response.success {
            tracing::info!(
                "Composite '{}' accepted, opportunity id: {:?}",
                composer_type,
                response.opportunity_id
            );
        } else {
            tracing::warn!("Composite '{}' rejected: {}", composer_type, response.message);
        }

        Ok(self.finish(response))
    }

    fn finish(&self, response: CreateResponse) -> CreateResponse {
        self.audit.record(AuditStream::CreateOpportunity, &response);
        response
    }
}
