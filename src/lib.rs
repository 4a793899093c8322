//! Salesforce Relay Library
//!
//! Backend between the Landbot/Magick chat flows and Salesforce: checks a
//! customer's identity document for existing records, classifies what must be
//! created, and submits the matching composite request.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Scenario classification, composite assembly and flow services.
//! - `integrations`: Salesforce client and chat-platform wire models.
//! - `app`: Router assembly.
//! - `audit_log`: JSON-lines audit trail of flow outcomes.
//! - `auth`: API key middleware.
//! - `composite`: Per-scenario composite builder and response interpretation.
//! - `config`: Configuration management.
//! - `docs`: OpenAPI document and Swagger UI.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `landbot_models`: Chat-platform request/response bodies.
//! - `models`: Salesforce composite request structures.
//! - `salesforce_client`: Token, duplicate search and composite endpoints.
//! - `scenario`: Duplicate-lookup classification.
//! - `services`: Duplicates and opportunity flows.

pub mod api;
pub mod core;
pub mod integrations;

pub mod app;
pub mod audit_log;
pub mod auth;
pub mod composite;
pub mod config;
pub mod docs;
pub mod errors;
pub mod handlers;
pub mod landbot_models;
pub mod models;
pub mod salesforce_client;
pub mod scenario;
pub mod services;
