//! Read handlers. Every response goes through the cache and reports its
//! origin in the `x-cache` header.

use std::future::Future;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use fieldops_cache::CacheKey;
use fieldops_domain::{
    DomainError, Invoice, InvoiceStatus, Order, OrderStatus, Page, Pagination, Resource,
};

use super::{cached, read_strategy};
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::repository::{OrderFilter, RepoResult};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// Cache one page of `load()` under `key`
async fn paged<T, Fut>(
    ctx: &AppContext,
    key: CacheKey,
    pagination: Pagination,
    ttl: Duration,
    refresh: bool,
    load: impl FnOnce() -> Fut,
) -> ApiResult<Response>
where
    T: Clone + Serialize + DeserializeOwned,
    Fut: Future<Output = RepoResult<Vec<T>>>,
{
    let key = key
        .param("page", pagination.page)
        .param("per_page", pagination.per_page)
        .build();

    let fetched = ctx
        .cache
        .fetch(&key, ttl, read_strategy(refresh), || async move {
            let all = load().await?;
            Ok::<_, DomainError>(Page::from_slice(&all, pagination))
        })
        .await?;

    Ok(cached(fetched))
}

// =============================================================================
// REFERENCE DATA
// =============================================================================

pub async fn list_teams(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let pagination = Pagination::new(query.page, query.per_page);
    paged(
        &ctx,
        CacheKey::new("teams"),
        pagination,
        ctx.cache.ttl().reference,
        query.refresh,
        || async move { records.list_teams().await },
    )
    .await
}

pub async fn list_units(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let pagination = Pagination::new(query.page, query.per_page);
    paged(
        &ctx,
        CacheKey::new("units"),
        pagination,
        ctx.cache.ttl().reference,
        query.refresh,
        || async move { records.list_units().await },
    )
    .await
}

pub async fn list_commodities(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let pagination = Pagination::new(query.page, query.per_page);
    paged(
        &ctx,
        CacheKey::new("commodities"),
        pagination,
        ctx.cache.ttl().reference,
        query.refresh,
        || async move { records.list_commodities().await },
    )
    .await
}

// =============================================================================
// LISTINGS
// =============================================================================

pub async fn list_clients(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let pagination = Pagination::new(query.page, query.per_page);
    paged(
        &ctx,
        CacheKey::new("clients"),
        pagination,
        ctx.cache.ttl().listing,
        query.refresh,
        || async move { records.list_clients().await },
    )
    .await
}

pub async fn list_orders(
    State(ctx): State<AppContext>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let filter = OrderFilter {
        status: query.status,
        client_id: query.client_id,
    };
    let key = CacheKey::new(Order::RESOURCE)
        .opt_param("status", query.status.map(|s| s.as_str()))
        .opt_param("client_id", query.client_id);

    paged(
        &ctx,
        key,
        Pagination::new(query.page, query.per_page),
        ctx.cache.ttl().listing,
        query.refresh,
        || async move { records.list_orders(filter).await },
    )
    .await
}

pub async fn list_invoices(
    State(ctx): State<AppContext>,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let key = CacheKey::new(Invoice::RESOURCE).opt_param("status", query.status.map(|s| s.as_str()));

    paged(
        &ctx,
        key,
        Pagination::new(query.page, query.per_page),
        ctx.cache.ttl().listing,
        query.refresh,
        || async move { records.list_invoices(query.status).await },
    )
    .await
}

// =============================================================================
// DETAILS
// =============================================================================

pub async fn get_order(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let key = CacheKey::detail(Order::RESOURCE, id).build();

    let fetched = ctx
        .cache
        .fetch(
            &key,
            ctx.cache.ttl().detail,
            read_strategy(query.refresh),
            || async move { records.get_order(id).await },
        )
        .await?;

    Ok(cached(fetched))
}

pub async fn get_invoice(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();
    let key = CacheKey::detail(Invoice::RESOURCE, id).build();

    let fetched = ctx
        .cache
        .fetch(
            &key,
            ctx.cache.ttl().detail,
            read_strategy(query.refresh),
            || async move { records.get_invoice(id).await },
        )
        .await?;

    Ok(cached(fetched))
}

/// Counts by order and invoice status
pub async fn dashboard(
    State(ctx): State<AppContext>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Response> {
    let records = ctx.records.clone();

    let fetched = ctx
        .cache
        .fetch(
            "dashboard",
            ctx.cache.ttl().dashboard,
            read_strategy(query.refresh),
            || async move { records.summary().await },
        )
        .await?;

    Ok(cached(fetched))
}
