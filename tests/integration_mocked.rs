/// Integration tests with mocked Salesforce endpoints
/// Exercises both chat flows and the HTTP surface without hitting a real org
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use salesforce_relay::app;
use salesforce_relay::audit_log::{AuditLog, AuditStream};
use salesforce_relay::config::{Config, SalesforceConfig};
use salesforce_relay::errors::AppError;
use salesforce_relay::handlers::AppState;
use salesforce_relay::landbot_models::OpportunityPayload;
use salesforce_relay::salesforce_client::SalesforceClient;
use salesforce_relay::scenario::Scenario;
use salesforce_relay::services::{DuplicatesService, OpportunityService};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/services/oauth2/token";
const DUPLICATES_PATH: &str = "/services/apexrest/duplicados";
const COMPOSITE_PATH: &str = "/services/data/v57.0/composite";
const API_KEY: &str = "landbot-test-key";

/// Helper function to create test config
fn create_test_config(base_url: &str, logs_dir: &Path) -> Config {
    Config {
        port: 3000,
        salesforce: SalesforceConfig {
            token_url: format!("{}{}", base_url, TOKEN_PATH),
            grant_type: "password".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            username: "relay@example.com".to_string(),
            password: "pass".to_string(),
            instance_url: base_url.to_string(),
            duplicates_endpoint: format!("{}{}", base_url, DUPLICATES_PATH),
            api_version: "v57.0".to_string(),
        },
        api_keys: vec!["magick-test-key".to_string(), API_KEY.to_string()],
        max_requests_per_min: 1000,
        logs_dir: logs_dir.to_path_buf(),
    }
}

struct Harness {
    server: MockServer,
    logs: TempDir,
    config: Config,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let logs = tempfile::tempdir().unwrap();
        let config = create_test_config(&server.uri(), logs.path());
        Self {
            server,
            logs,
            config,
        }
    }

    fn client(&self) -> SalesforceClient {
        SalesforceClient::new(self.config.salesforce.clone()).unwrap()
    }

    fn audit(&self) -> AuditLog {
        AuditLog::new(self.logs.path()).unwrap()
    }

    fn duplicates(&self) -> DuplicatesService {
        DuplicatesService::new(self.client(), self.audit())
    }

    fn opportunities(&self) -> OpportunityService {
        OpportunityService::new(self.client(), self.audit())
    }

    fn router(&self) -> Router {
        app::router(Arc::new(AppState {
            config: self.config.clone(),
            duplicates: self.duplicates(),
            opportunities: self.opportunities(),
        }))
    }

    async fn mock_token(&self) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("client_id=client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-token",
                "instance_url": "https://example.my.salesforce.com",
                "token_type": "Bearer"
            })))
            .mount(&self.server)
            .await;
    }

    async fn mock_lookup(&self, document: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(DUPLICATES_PATH))
            .and(query_param("dni", document))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Waits for the fire-and-forget audit writes to land.
    async fn audit_lines(&self, stream: AuditStream, expected: usize) -> Vec<Value> {
        let path = self.audit().path(stream);
        for _ in 0..50 {
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                let lines: Vec<Value> = content
                    .lines()
                    .map(|l| serde_json::from_str(l).unwrap())
                    .collect();
                if lines.len() >= expected {
                    return lines;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("audit log {} never reached {} lines", path.display(), expected);
    }
}

fn payload(value: Value) -> OpportunityPayload {
    serde_json::from_value(value).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, api_key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// ---------------------------------------------------------------------------
// Duplicates flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_duplicates_open_opportunity_blocks_creation() {
    let harness = Harness::start().await;
    harness.mock_token().await;

    let lookup = json!([
        {"total": 1},
        {
            "CUENTA: ID": "001X",
            "OPORTUNIDADES": [
                {"OPP: STATUS": "Closed Won"},
                {"OPP: STATUS": "Negotiation"}
            ],
            "UBICACIONES": [{"id": "U1"}]
        }
    ]);
    harness
        .mock_lookup("12345678Z", ResponseTemplate::new(200).set_body_json(&lookup))
        .await;

    let response = harness
        .duplicates()
        .check_duplicates("12345678Z")
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.composer_type, Scenario::OpportunityOpen);
    assert_eq!(response.account_id_callback, "001X");
    assert_eq!(response.sf_raw, lookup);
    assert_eq!(
        response.message,
        "Ya existe un cliente con oportunidad abierta. No se puede crear."
    );
}

#[tokio::test]
async fn test_duplicates_closed_opportunities() {
    let harness = Harness::start().await;
    harness.mock_token().await;
    harness
        .mock_lookup(
            "B12345678",
            ResponseTemplate::new(200).set_body_json(json!([
                {},
                {"CUENTA: ID": "001X", "OPORTUNIDADES": [{"OPP: STATUS": "Closed Lost"}]}
            ])),
        )
        .await;

    let response = harness
        .duplicates()
        .check_duplicates("B12345678")
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.composer_type, Scenario::OpportunityClose);
    assert_eq!(response.account_id_callback, "001X");
}

#[tokio::test]
async fn test_duplicates_empty_body_is_client_none() {
    let harness = Harness::start().await;
    harness.mock_token().await;
    harness
        .mock_lookup("X0000000T", ResponseTemplate::new(200))
        .await;

    let response = harness
        .duplicates()
        .check_duplicates("X0000000T")
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.composer_type, Scenario::ClientNone);
    assert_eq!(response.account_id_callback, "");
    assert_eq!(response.sf_raw, Value::Null);

    let lines = harness.audit_lines(AuditStream::Duplicates, 1).await;
    assert_eq!(lines[0]["MAI_composer_type_sf"], "Client_none");
    assert!(lines[0]["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_duplicates_lookup_failure_is_audited() {
    let harness = Harness::start().await;
    harness.mock_token().await;
    harness
        .mock_lookup(
            "12345678Z",
            ResponseTemplate::new(500).set_body_json(json!([{"errorCode": "APEX_ERROR"}])),
        )
        .await;

    let err = harness
        .duplicates()
        .check_duplicates("12345678Z")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(ref msg)
        if msg == "Error consultando duplicados en Salesforce"));

    let lines = harness.audit_lines(AuditStream::Duplicates, 1).await;
    assert_eq!(lines[0]["success"], false);
    assert_eq!(lines[0]["message"], "Error consultando duplicados en SF");
    assert_eq!(lines[0]["error"], json!([{"errorCode": "APEX_ERROR"}]));
    assert_eq!(lines[0]["docParaDuplicados"], "12345678Z");
}

#[tokio::test]
async fn test_duplicates_token_failure() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "authentication failure"
        })))
        .mount(&harness.server)
        .await;

    let err = harness
        .duplicates()
        .check_duplicates("12345678Z")
        .await
        .unwrap_err();
    assert_eq!(
        err.payload(),
        json!("No se pudo obtener token de Salesforce para duplicados")
    );

    let lines = harness.audit_lines(AuditStream::Duplicates, 1).await;
    assert_eq!(
        lines[0]["message"],
        "No se pudo obtener token de Salesforce para duplicados"
    );
    assert_eq!(lines[0]["docParaDuplicados"], "12345678Z");
}

// ---------------------------------------------------------------------------
// Opportunity flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_opportunity_success() {
    let harness = Harness::start().await;
    harness.mock_token().await;

    Mock::given(method("POST"))
        .and(path(COMPOSITE_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"allOrNone": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "compositeResponse": [
                {"referenceId": "catalogo", "httpStatusCode": 200, "body": {"records": [{"Id": "01s1"}]}},
                {"referenceId": "oportunidad", "httpStatusCode": 201, "body": {"id": "006ABC", "success": true}},
                {"referenceId": "oferta", "httpStatusCode": 201, "body": {"id": "0Q0XYZ", "success": true}}
            ]
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness
        .opportunities()
        .create_opportunity(&payload(json!({
            "MAI_composer_type_sf": "Opportunity_none",
            "MAI_accountid_callback_sf": "001X",
            "MAI_opportunityName": "Instalación Pérez",
            "MAI_fld_numPaneles__c": "8"
        })))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.message, "Enviado correctamente a Salesforce");
    assert_eq!(response.opportunity_id.as_deref(), Some("006ABC"));
    assert!(response.composite_response.is_some());

    let lines = harness
        .audit_lines(AuditStream::CreateOpportunity, 1)
        .await;
    assert_eq!(lines[0]["opportunityId"], "006ABC");
}

#[tokio::test]
async fn test_create_opportunity_sub_request_error() {
    let harness = Harness::start().await;
    harness.mock_token().await;

    Mock::given(method("POST"))
        .and(path(COMPOSITE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "compositeResponse": [
                {"referenceId": "cliente", "httpStatusCode": 400, "body": [
                    {"errorCode": "PROCESSING_HALTED", "message": "The transaction was rolled back since another operation in the same transaction failed."}
                ]},
                {"referenceId": "contacto1", "httpStatusCode": 400, "body": [
                    {"errorCode": "REQUIRED_FIELD_MISSING", "message": "Required fields are missing: [LastName]"}
                ]},
                {"referenceId": "cliente1", "httpStatusCode": 400, "body": [
                    {"errorCode": "PROCESSING_HALTED", "message": "The transaction was rolled back since another operation in the same transaction failed."}
                ]}
            ]
        })))
        .mount(&harness.server)
        .await;

    let response = harness
        .opportunities()
        .create_opportunity(&payload(json!({"MAI_composer_type_sf": "Client_none"})))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(
        response.message,
        "Error Salesforce: REQUIRED_FIELD_MISSING => Required fields are missing: [LastName]"
    );
    assert!(response.opportunity_id.is_none());
}

#[tokio::test]
async fn test_create_opportunity_transport_error_keeps_body() {
    let harness = Harness::start().await;
    harness.mock_token().await;

    let upstream = json!([{"errorCode": "INVALID_SESSION_ID", "message": "Session expired"}]);
    Mock::given(method("POST"))
        .and(path(COMPOSITE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(&upstream))
        .mount(&harness.server)
        .await;

    let response = harness
        .opportunities()
        .create_opportunity(&payload(json!({
            "MAI_composer_type_sf": "Location_none",
            "MAI_accountid_callback_sf": "001X"
        })))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.message, "Error al enviar composite a Salesforce");
    assert_eq!(response.error, Some(upstream));
}

#[tokio::test]
async fn test_create_opportunity_token_failure() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&harness.server)
        .await;

    let result = harness
        .opportunities()
        .create_opportunity(&payload(json!({"MAI_composer_type_sf": "Client_none"})))
        .await;
    assert!(result.is_err());

    let lines = harness
        .audit_lines(AuditStream::CreateOpportunity, 1)
        .await;
    assert_eq!(lines[0]["success"], false);
    assert_eq!(lines[0]["message"], "No se pudo obtener token de Salesforce");
}

#[tokio::test]
async fn test_create_without_scenario_submits_nothing() {
    let harness = Harness::start().await;
    harness.mock_token().await;
    Mock::given(method("POST"))
        .and(path(COMPOSITE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&harness.server)
        .await;

    let service = harness.opportunities();

    let response = service
        .create_opportunity(&payload(json!({"MAI_name": "Ana"})))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.message, "No se procede a crear nada en Salesforce.");

    let response = service
        .create_opportunity(&payload(json!({"MAI_composer_type_sf": "Something_else"})))
        .await
        .unwrap();
    assert!(response.success);

    let response = service
        .create_opportunity(&payload(json!({"MAI_composer_type_sf": "Opportunity_open"})))
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(
        response.message,
        "Ya existe un cliente con oportunidad abierta. No se puede crear."
    );
}

#[tokio::test]
async fn test_create_fetches_token_before_checking_scenario() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&harness.server)
        .await;

    let service = harness.opportunities();
    for composer_type in ["Opportunity_open", ""] {
        let err = service
            .create_opportunity(&payload(json!({"MAI_composer_type_sf": composer_type})))
            .await
            .unwrap_err();
        assert_eq!(err.payload(), json!("No se pudo obtener token de Salesforce"));
    }
}

// ---------------------------------------------------------------------------
// HTTP surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_is_public() {
    let harness = Harness::start().await;
    let response = harness
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_api_key_is_401() {
    let harness = Harness::start().await;
    let response = harness
        .router()
        .oneshot(post_json(
            "/api/salesforce/duplicates",
            None,
            json!({"numDocumento": "12345678Z"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body, json!({"success": false, "message": "API Key is required"}));
}

#[tokio::test]
async fn test_wrong_api_key_is_403() {
    let harness = Harness::start().await;
    let response = harness
        .router()
        .oneshot(post_json(
            "/api/salesforce/create",
            Some("not-a-key"),
            json!({"MAI_composer_type_sf": "Client_none"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Invalid API Key");
}

#[tokio::test]
async fn test_duplicates_without_document_is_400() {
    let harness = Harness::start().await;
    let response = harness
        .router()
        .oneshot(post_json(
            "/api/salesforce/duplicates",
            Some(API_KEY),
            json!({"numDocumento": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Falta DNI/CIF para verificar duplicados.");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let harness = Harness::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/salesforce/create")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from("{not json"))
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicates_over_http_with_query_key() {
    let harness = Harness::start().await;
    harness.mock_token().await;
    harness
        .mock_lookup(
            "B12345678",
            ResponseTemplate::new(200).set_body_json(json!([
                {},
                {"CUENTA: ID": "001Y", "OPORTUNIDADES": [], "UBICACIONES": [{"id": "U1"}]}
            ])),
        )
        .await;

    let response = harness
        .router()
        .oneshot(post_json(
            "/api/salesforce/duplicates?api_key=magick-test-key",
            None,
            json!({"cif": "B12345678"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["MAI_composer_type_sf"], "Opportunity_none");
    assert_eq!(body["MAI_accountid_callback_sf"], "001Y");
}

#[tokio::test]
async fn test_rate_limit_answers_json() {
    let mut harness = Harness::start().await;
    harness.config.max_requests_per_min = 1;
    let router = app::rate_limited_router(Arc::new(AppState {
        config: harness.config.clone(),
        duplicates: harness.duplicates(),
        opportunities: harness.opportunities(),
    }))
    .unwrap();

    let request = || {
        let mut request = post_json(
            "/api/salesforce/duplicates",
            None,
            json!({"numDocumento": "12345678Z"}),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        request
    };

    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(second).await;
    assert_eq!(
        body,
        json!({"success": false, "message": "Rate limit exceeded. Try again in a moment."})
    );
}

#[tokio::test]
async fn test_token_failure_over_http_is_500() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;

    let response = harness
        .router()
        .oneshot(post_json(
            "/api/salesforce/create",
            Some(API_KEY),
            json!({"MAI_composer_type_sf": "Opportunity_close", "MAI_accountid_callback_sf": "001X"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Error interno al crear oportunidad");
    assert_eq!(body["error"], "No se pudo obtener token de Salesforce");
}
