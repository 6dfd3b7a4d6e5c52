//! Cache administration endpoints.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fieldops_cache::{InvalidationOutcome, ServiceStats};
use fieldops_domain::Category;

use crate::context::AppContext;
use crate::error::ApiResult;

#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Category name, singular or plural, or `all`
    pub category: String,
    pub entity_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removed {
    pub removed: usize,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn invalidate(
    State(ctx): State<AppContext>,
    Json(request): Json<InvalidateRequest>,
) -> ApiResult<Json<InvalidationOutcome>> {
    let category: Category = request.category.parse()?;
    Ok(Json(ctx.cache.invalidate(category, request.entity_id)))
}

/// Drop every entry in the namespace. Subscribers are not notified.
pub async fn clear(State(ctx): State<AppContext>) -> Json<Removed> {
    let removed = ctx.cache.clear_all();
    tracing::info!(removed, "Cache cleared");
    Json(Removed { removed })
}

/// Delete expired entries that were never read again
pub async fn purge(State(ctx): State<AppContext>) -> Json<Removed> {
    Json(Removed {
        removed: ctx.cache.store().purge_expired(),
    })
}

pub async fn stats(State(ctx): State<AppContext>) -> Json<ServiceStats> {
    Json(ctx.cache.stats())
}

/// Server-sent stream of invalidation events, optionally for one category
pub async fn events(
    State(ctx): State<AppContext>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let category = match query.category {
        Some(name) => name.parse::<Category>()?,
        None => Category::All,
    };
    let mut subscription = ctx.cache.bus().subscribe(category);

    tracing::debug!(category = %category, "Invalidation stream opened");

    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match Event::default().event("invalidated").json_data(&event) {
                Ok(sse) => yield Ok::<_, Infallible>(sse),
                Err(e) => tracing::warn!(error = %e, "Failed to encode invalidation event"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
