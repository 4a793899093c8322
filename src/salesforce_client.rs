use crate::config::SalesforceConfig;
use crate::errors::AppError;
use crate::models::CompositeRequest;
use reqwest;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing;

pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(20);
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);
pub const COMPOSITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client for the three Salesforce endpoints the relay talks to: the OAuth
/// token endpoint, the duplicate search and the composite REST resource.
///
/// Holds no per-request state; every operation gets a fresh token from the caller.
#[derive(Clone)]
pub struct SalesforceClient {
    client: reqwest::Client,
    config: SalesforceConfig,
}

impl SalesforceClient {
    /// Creates a new `SalesforceClient`.
    ///
    /// Timeouts are set per call, see `TOKEN_TIMEOUT`, `LOOKUP_TIMEOUT` and
    /// `COMPOSITE_TIMEOUT`.
    pub fn new(config: SalesforceConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Salesforce client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    pub fn api_version(&self) -> &str {
        &self.config.api_version
    }

    /// Exchanges the stored credentials for a bearer token (password grant).
    ///
    /// Any failure is logged and reported to the caller as `failure_message`.
    ///
    /// # Returns
    ///
    /// * `Result<String, AppError>` - The access token.
    pub async fn fetch_access_token(&self, failure_message: &str) -> Result<String, AppError> {
        tracing::debug!("Requesting Salesforce access token");

        let response = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", self.config.grant_type.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Salesforce token request failed: {}", e);
                token_error(failure_message)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = read_body(response).await;
            tracing::error!("Salesforce token endpoint returned {}: {}", status, body);
            return Err(token_error(failure_message));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Salesforce token response: {}", e);
            token_error(failure_message)
        })?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => {
                tracing::error!("Salesforce token response has no access_token");
                Err(token_error(failure_message))
            }
        }
    }

    /// Runs the duplicate search for an identity document.
    ///
    /// # Arguments
    ///
    /// * `token` - Bearer token from `fetch_access_token`.
    /// * `document` - DNI/NIE/CIF, sent as the `dni` query parameter.
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - The raw lookup result; `Null` for an empty body.
    pub async fn search_duplicates(&self, token: &str, document: &str) -> Result<Value, AppError> {
        let url = reqwest::Url::parse_with_params(
            &self.config.duplicates_endpoint,
            &[("dni", document)],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Searching Salesforce duplicates for document: {}", document);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Duplicates request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = read_body(response).await;
            return Err(AppError::UpstreamResponse { status, body });
        }

        let text = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read duplicates response: {}", e))
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse duplicates response: {}", e))
        })
    }

    /// Submits a composite request.
    ///
    /// A 2xx answer is returned as-is, including logical errors inside it;
    /// interpreting it is up to the caller.
    pub async fn submit_composite(
        &self,
        token: &str,
        body: &CompositeRequest,
    ) -> Result<Value, AppError> {
        let url = format!(
            "{}/services/data/{}/composite",
            self.config.instance_url, self.config.api_version
        );
        tracing::info!(
            "Submitting composite with {} sub-requests to {}",
            body.composite_request.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .timeout(COMPOSITE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Composite request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = read_body(response).await;
            return Err(AppError::UpstreamResponse { status, body });
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse composite response: {}", e))
        })
    }
}

fn token_error(message: &str) -> AppError {
    AppError::ExternalApiError(message.to_string())
}

/// Error bodies are kept for the caller: decoded JSON when possible, text otherwise.
async fn read_body(response: reqwest::Response) -> Value {
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
