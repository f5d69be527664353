//! Commission engine for salon appointments.
//!
//! Tracks per-service staff commissions through an approval lifecycle
//! (PENDING, APPROVED, LOCKED, REVERSED), keeps an append-only adjustment
//! trail, materializes monthly per-staff/per-branch summaries and serves
//! management reports over HTTP.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod services;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

/// Builds the versioned API router. State is attached by the caller.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // ledger
        .route("/commissions", post(handlers::commissions::create_commission))
        .route("/commissions", get(handlers::commissions::list_commissions))
        .route(
            "/commissions/pending",
            get(handlers::commissions::list_pending_commissions),
        )
        .route("/commissions/:id", get(handlers::commissions::get_commission))
        .route(
            "/commissions/:id/adjustments",
            get(handlers::commissions::get_adjustment_history),
        )
        .route(
            "/commissions/:id/approve",
            post(handlers::commissions::approve_commission),
        )
        .route(
            "/commissions/:id/lock",
            post(handlers::commissions::lock_commission),
        )
        .route(
            "/commissions/:id/reverse",
            post(handlers::commissions::reverse_commission),
        )
        .route(
            "/commissions/:id/adjust",
            post(handlers::commissions::adjust_commission),
        )
        // summaries
        .route(
            "/summaries/generate",
            post(handlers::summaries::generate_summary),
        )
        .route(
            "/summaries/generate-month",
            post(handlers::summaries::generate_summaries_for_month),
        )
        .route(
            "/summaries/approve-month",
            post(handlers::summaries::approve_summaries_for_month),
        )
        .route(
            "/summaries/lock-month",
            post(handlers::summaries::lock_summaries_for_month),
        )
        .route("/summaries", get(handlers::summaries::list_summaries))
        .route("/summaries/:id", get(handlers::summaries::get_summary))
        .route(
            "/summaries/:id/approve",
            post(handlers::summaries::approve_summary),
        )
        .route("/summaries/:id/lock", post(handlers::summaries::lock_summary))
        // reports
        .route("/reports/dashboard", get(handlers::reports::dashboard))
        .route("/reports/branch-wise", get(handlers::reports::branch_wise))
        .route("/reports/staff-wise", get(handlers::reports::staff_wise))
        .route(
            "/reports/monthly-trend",
            get(handlers::reports::monthly_trend),
        )
        .route("/reports/quarterly", get(handlers::reports::quarterly))
        .route("/reports/year-end", get(handlers::reports::year_end))
}

/// Health and operational endpoints mounted outside the versioned API.
pub fn operational_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::liveness_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> (axum::http::StatusCode, String) {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => match String::from_utf8(buffer) {
            Ok(body) => (axum::http::StatusCode::OK, body),
            Err(_) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "metrics encoding error".to_string(),
            ),
        },
        Err(_) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "metrics error".to_string(),
        ),
    }
}
