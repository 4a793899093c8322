use serde::Deserialize;
use std::path::PathBuf;

/// Salesforce connection settings shared by the token provider, the
/// duplicate lookup and the composite submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesforceConfig {
    pub token_url: String,
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub instance_url: String,
    pub duplicates_endpoint: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub salesforce: SalesforceConfig,
    /// Keys accepted on `x-api-key` / `?api_key=` (Magick and Landbot).
    pub api_keys: Vec<String>,
    pub max_requests_per_min: u32,
    pub logs_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let salesforce = SalesforceConfig {
            token_url: required_url("SF_TOKEN_URL")?,
            grant_type: std::env::var("SF_GRANT_TYPE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "password".to_string()),
            client_id: required("SF_CLIENT_ID")?,
            client_secret: required("SF_CLIENT_SECRET")?,
            username: required("SF_USERNAME")?,
            password: required("SF_PASSWORD")?,
            instance_url: required_url("SF_INSTANCE_URL")?
                .trim_end_matches('/')
                .to_string(),
            duplicates_endpoint: required_url("SF_DUPLICATES_ENDPOINT")?,
            api_version: std::env::var("SF_API_VERSION")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "v57.0".to_string()),
        };

        let api_keys: Vec<String> = ["MAGICK_API_KEY", "LANDBOT_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
            .collect();
        if api_keys.is_empty() {
            anyhow::bail!("MAGICK_API_KEY or LANDBOT_API_KEY environment variable required");
        }

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            salesforce,
            api_keys,
            max_requests_per_min: std::env::var("MAX_REQUESTS_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_REQUESTS_PER_MIN must be a positive number"))
                .and_then(|max: u32| {
                    if max == 0 {
                        anyhow::bail!("MAX_REQUESTS_PER_MIN cannot be zero");
                    }
                    Ok(max)
                })?,
            logs_dir: std::env::var("LOGS_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Salesforce token URL: {}", config.salesforce.token_url);
        tracing::debug!("Salesforce instance URL: {}", config.salesforce.instance_url);
        tracing::debug!(
            "Salesforce duplicates endpoint: {}",
            config.salesforce.duplicates_endpoint
        );
        tracing::debug!("Salesforce API version: {}", config.salesforce.api_version);
        tracing::debug!("Accepted API keys configured: {}", config.api_keys.len());
        tracing::debug!("Rate limit: {} requests/min", config.max_requests_per_min);
        tracing::debug!("Audit log directory: {}", config.logs_dir.display());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

fn required_url(name: &str) -> anyhow::Result<String> {
    let value = required(name)?;
    if !value.starts_with("http://") && !value.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    url::Url::parse(&value).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    Ok(value)
}
