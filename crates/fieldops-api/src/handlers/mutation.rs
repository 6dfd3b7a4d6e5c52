//! Write handlers. Each write goes to the record store first and then
//! invalidates the affected category, so the next listing is a miss.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use fieldops_cache::WriteStrategy;
use fieldops_domain::{Client, Invoice, InvoiceStatus, Order, OrderStatus};

use crate::context::AppContext;
use crate::error::ApiResult;
use crate::repository::{NewClient, NewInvoice, NewOrder};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InvoiceStatusUpdate {
    pub status: InvoiceStatus,
}

pub async fn create_client(
    State(ctx): State<AppContext>,
    Json(input): Json<NewClient>,
) -> ApiResult<(StatusCode, Json<Client>)> {
    let records = ctx.records.clone();
    let client = ctx
        .cache
        .mutate(WriteStrategy::WriteAround, move || async move {
            records.create_client(input).await
        })
        .await?;

    tracing::info!(client_id = %client.id, name = %client.name, "Client created");
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn create_order(
    State(ctx): State<AppContext>,
    Json(input): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let records = ctx.records.clone();
    let order = ctx
        .cache
        .mutate(WriteStrategy::WriteAround, move || async move {
            records.create_order(input).await
        })
        .await?;

    tracing::info!(order_id = %order.id, client_id = %order.client_id, "Order created");
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn create_invoice(
    State(ctx): State<AppContext>,
    Json(input): Json<NewInvoice>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    let records = ctx.records.clone();
    let invoice = ctx
        .cache
        .mutate(WriteStrategy::WriteAround, move || async move {
            records.create_invoice(input).await
        })
        .await?;

    tracing::info!(
        invoice_id = %invoice.id,
        order_id = %invoice.order_id,
        amount_cents = invoice.amount_cents,
        "Invoice created"
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Status changes are written through: the detail entry is refreshed in place
pub async fn update_order_status(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(update): Json<OrderStatusUpdate>,
) -> ApiResult<Json<Order>> {
    let records = ctx.records.clone();
    let order = ctx
        .cache
        .mutate(WriteStrategy::WriteThrough, move || async move {
            records.update_order_status(id, update.status).await
        })
        .await?;

    tracing::info!(order_id = %id, status = order.status.as_str(), "Order status updated");
    Ok(Json(order))
}

pub async fn update_invoice_status(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(update): Json<InvoiceStatusUpdate>,
) -> ApiResult<Json<Invoice>> {
    let records = ctx.records.clone();
    let invoice = ctx
        .cache
        .mutate(WriteStrategy::WriteThrough, move || async move {
            records.update_invoice_status(id, update.status).await
        })
        .await?;

    tracing::info!(invoice_id = %id, status = invoice.status.as_str(), "Invoice status updated");
    Ok(Json(invoice))
}
