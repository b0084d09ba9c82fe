//! # Lease API
//!
//! HTTP surface over the reconciliation engine.

pub mod config;
pub mod handlers;
pub mod security;
pub mod state;
pub mod utils;


use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use handlers::{contracts, files, health, kyc, landlords, units, verify};
use security::security_middleware;
use state::AppState;

/// Scans are photos or PDFs; a single request carries at most three.
const MAX_BODY_BYTES: usize = 30 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Public routes (signed links, signed callbacks, public verification)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/verify/document", post(verify::verify_document))
        .route("/api/verify/{doc_hash}", get(verify::verify_hash))
        .route("/api/kyc/webhook", post(kyc::webhook))
        .route("/files/{*key}", get(files::signed_file));

    // Protected routes (service headers; landlord routes also need X-Landlord-Id)
    let protected_routes = Router::new()
        .route("/api/contracts", post(contracts::initiate_contract))
        .route(
            "/api/contracts/{doc_hash}/invitation",
            post(contracts::send_invitation),
        )
        .route(
            "/api/contracts/{doc_hash}/approve",
            post(contracts::approve_contract),
        )
        .route(
            "/api/contracts/{doc_hash}/approve-with-new-unit",
            post(contracts::approve_with_new_unit),
        )
        .route(
            "/api/contracts/{doc_hash}/terminate",
            post(contracts::terminate_contract),
        )
        .route("/api/landlords", post(landlords::register_landlord))
        .route("/api/landlords/me/dashboard", get(landlords::dashboard))
        .route("/api/landlords/me/documents", get(landlords::document_url))
        .route("/api/units", post(units::register_unit))
        .route("/api/units/{unit_id}/verify", post(units::verify_unit))
        .route("/api/units/{unit_id}/archive", post(units::archive_unit))
        .route("/api/units/{unit_id}/restore", post(units::restore_unit))
        .route("/api/kyc/session", post(kyc::start_session))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
