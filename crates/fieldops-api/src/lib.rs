//! # FieldOps API
//!
//! HTTP service for the field operations admin dashboard. Listings read
//! through the cache, writes invalidate the categories they touch.
//!
//! ## Features
//!
//! - **Cached Listings**: Teams, units, commodities, clients, orders, invoices
//! - **Mutations**: Create and status updates with category invalidation
//! - **Cache Admin**: Manual invalidation, clear, stats, event stream
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Axum HTTP Server                         │
//! │             (REST handlers + SSE event stream)              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       AppContext                            │
//! │              (CacheService, RecordStore)                    │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     fieldops-cache      │   │        RecordStore           │
//! │  (entries, bus, relay)  │   │     (Source of Truth)        │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod repository;

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{delete, get, patch, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
pub use handlers::CACHE_HEADER;
pub use repository::{MemoryRecordStore, RecordStore};

use handlers::{admin, mutation, query};

/// Build the Axum router
pub fn build_router(ctx: AppContext, cors_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(allow_origin(cors_origins))
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(CACHE_HEADER)]);

    Router::new()
        // Reference data
        .route("/api/teams", get(query::list_teams))
        .route("/api/units", get(query::list_units))
        .route("/api/commodities", get(query::list_commodities))
        // Listings, details and writes
        .route("/api/clients", get(query::list_clients).post(mutation::create_client))
        .route("/api/orders", get(query::list_orders).post(mutation::create_order))
        .route("/api/orders/{id}", get(query::get_order))
        .route("/api/orders/{id}/status", patch(mutation::update_order_status))
        .route("/api/invoices", get(query::list_invoices).post(mutation::create_invoice))
        .route("/api/invoices/{id}", get(query::get_invoice))
        .route("/api/invoices/{id}/status", patch(mutation::update_invoice_status))
        .route("/api/dashboard", get(query::dashboard))
        // Cache administration
        .route("/api/cache", delete(admin::clear))
        .route("/api/cache/invalidate", post(admin::invalidate))
        .route("/api/cache/purge", post(admin::purge))
        .route("/api/cache/stats", get(admin::stats))
        .route("/api/cache/events", get(admin::events))
        // Health check
        .route("/health", get(admin::health_check))
        .route("/", get(|| async { "FieldOps API" }))
        // State and middleware
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn allow_origin(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return AllowOrigin::from(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
