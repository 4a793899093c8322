//! Prints the composite request a `/create` payload would submit, without
//! calling Salesforce.
//!
//! Usage: `preview_composite [--api-version v57.0] [payload.json]`
//! (reads the payload from stdin when no file is given).

use anyhow::Context;
use salesforce_relay::{
    core::composite::{CompositeBuilder, DEFAULT_API_VERSION},
    integrations::landbot_models::OpportunityPayload,
};
use std::io::Read;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut api_version = std::env::var("SF_API_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
    let mut input_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--api-version" => {
                api_version = args.next().context("--api-version needs a value")?;
            }
            _ => input_path = Some(arg),
        }
    }

    let raw = match &input_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let payload: OpportunityPayload =
        serde_json::from_str(&raw).context("Payload is not a valid /create body")?;

    match CompositeBuilder::new(api_version).build(&payload) {
        Some(composite) => {
            tracing::info!(
                "Scenario '{}' -> {} sub-requests",
                payload.composer_type(),
                composite.composite_request.len()
            );
            println!("{}", serde_json::to_string_pretty(&composite)?);
        }
        None => {
            println!(
                "Scenario '{}' submits nothing to Salesforce.",
                payload.composer_type()
            );
        }
    }

    Ok(())
}
