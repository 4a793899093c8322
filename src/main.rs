use salesforce_relay::{
    api::handlers::AppState,
    app,
    audit_log::AuditLog,
    config::Config,
    core::services::{DuplicatesService, OpportunityService},
    integrations::salesforce_client::SalesforceClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads the configuration, opens the audit log
/// directory, builds the Salesforce client and the two flow services, then
/// starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salesforce_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let audit = AuditLog::new(&config.logs_dir)?;
    tracing::info!("Audit log directory ready: {}", audit.dir().display());

    let client = SalesforceClient::new(config.salesforce.clone())?;
    tracing::info!("✓ Salesforce client initialized: {}", config.salesforce.instance_url);

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        duplicates: DuplicatesService::new(client.clone(), audit.clone()),
        opportunities: OpportunityService::new(client, audit),
    });

    let app = app::rate_limited_router(app_state)?;
    tracing::info!(
        "Rate limit: {} requests/min per client",
        config.max_requests_per_min
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
