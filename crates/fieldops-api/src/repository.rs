//! # Record Store
//!
//! Source of truth behind the cache. The trait is the seam where the hosted
//! backend plugs in; [`MemoryRecordStore`] keeps everything in process for
//! local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use fieldops_domain::{
    Client, Commodity, DashboardSummary, DomainError, Invoice, InvoiceStatus, Order, OrderStatus,
    Team, Unit,
};

pub type RepoResult<T> = Result<T, DomainError>;

// =============================================================================
// INPUTS
// =============================================================================

/// Filter for order listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub client_id: Uuid,
    pub team_id: Option<Uuid>,
    pub commodity_id: Option<Uuid>,
    pub quantity: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub order_id: Uuid,
    pub amount_cents: i64,
    pub due_at: Option<DateTime<Utc>>,
}

// =============================================================================
// RECORD STORE
// =============================================================================

/// Dashboard data operations
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_teams(&self) -> RepoResult<Vec<Team>>;

    async fn list_units(&self) -> RepoResult<Vec<Unit>>;

    async fn list_commodities(&self) -> RepoResult<Vec<Commodity>>;

    /// Clients ordered by name
    async fn list_clients(&self) -> RepoResult<Vec<Client>>;

    /// Orders newest first
    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<Vec<Order>>;

    /// Invoices newest first
    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> RepoResult<Vec<Invoice>>;

    async fn get_order(&self, id: Uuid) -> RepoResult<Order>;

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Invoice>;

    async fn create_client(&self, input: NewClient) -> RepoResult<Client>;

    async fn create_order(&self, input: NewOrder) -> RepoResult<Order>;

    async fn create_invoice(&self, input: NewInvoice) -> RepoResult<Invoice>;

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> RepoResult<Order>;

    async fn update_invoice_status(&self, id: Uuid, status: InvoiceStatus) -> RepoResult<Invoice>;

    async fn summary(&self) -> RepoResult<DashboardSummary>;
}

#[derive(Debug, Default)]
struct Records {
    teams: Vec<Team>,
    units: Vec<Unit>,
    commodities: Vec<Commodity>,
    clients: Vec<Client>,
    orders: Vec<Order>,
    invoices: Vec<Invoice>,
}

/// In-process record store
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Records>,
}

fn not_found(entity_type: &str, id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity_type: entity_type.to_string(),
        id: id.to_string(),
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a small demo data set
    pub fn seeded() -> Self {
        let now = Utc::now();
        let team = |name: &str| Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
        };
        let north = team("North Region");
        let port = team("Port Authority");

        let units = vec![
            Unit {
                id: Uuid::new_v4(),
                team_id: north.id,
                name: "Grain Lab 1".into(),
                active: true,
            },
            Unit {
                id: Uuid::new_v4(),
                team_id: port.id,
                name: "Dock Survey".into(),
                active: true,
            },
        ];

        let commodity = |name: &str, uom: &str| Commodity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit_of_measure: uom.to_string(),
        };
        let commodities = vec![
            commodity("Wheat", "t"),
            commodity("Soybeans", "t"),
            commodity("Crude Oil", "bbl"),
        ];

        let client = |name: &str, email: &str| Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: Some(email.to_string()),
            phone: None,
            created_at: now,
        };
        let clients = vec![
            client("Harbor Grain Co", "ops@harborgrain.example"),
            client("Meridian Freight", "billing@meridian.example"),
        ];

        let orders = vec![Order {
            id: Uuid::new_v4(),
            client_id: clients[0].id,
            team_id: Some(north.id),
            commodity_id: Some(commodities[0].id),
            status: OrderStatus::Scheduled,
            quantity: 1200.0,
            notes: Some("Draft survey at berth 4".into()),
            created_at: now,
            updated_at: now,
        }];

        let invoices = vec![Invoice {
            id: Uuid::new_v4(),
            order_id: orders[0].id,
            client_id: clients[0].id,
            amount_cents: 185_000,
            status: InvoiceStatus::Sent,
            issued_at: now,
            due_at: Some(now + Duration::days(30)),
        }];

        Self {
            records: RwLock::new(Records {
                teams: vec![north, port],
                units,
                commodities,
                clients,
                orders,
                invoices,
            }),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_teams(&self) -> RepoResult<Vec<Team>> {
        Ok(self.records.read().await.teams.clone())
    }

    async fn list_units(&self) -> RepoResult<Vec<Unit>> {
        Ok(self.records.read().await.units.clone())
    }

    async fn list_commodities(&self) -> RepoResult<Vec<Commodity>> {
        Ok(self.records.read().await.commodities.clone())
    }

    async fn list_clients(&self) -> RepoResult<Vec<Client>> {
        let mut clients = self.records.read().await.clients.clone();
        clients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(clients)
    }

    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .records
            .read()
            .await
            .orders
            .iter()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.client_id.is_none_or(|c| o.client_id == c))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> RepoResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .records
            .read()
            .await
            .invoices
            .iter()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Order> {
        self.records
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| not_found("order", id))
    }

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Invoice> {
        self.records
            .read()
            .await
            .invoices
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| not_found("invoice", id))
    }

    async fn create_client(&self, input: NewClient) -> RepoResult<Client> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("client name is required".into()));
        }

        let mut records = self.records.write().await;
        if records
            .clients
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(DomainError::Validation(format!("client '{name}' already exists")));
        }

        let client = Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: input.email,
            phone: input.phone,
            created_at: Utc::now(),
        };
        records.clients.push(client.clone());
        Ok(client)
    }

    async fn create_order(&self, input: NewOrder) -> RepoResult<Order> {
        if input.quantity <= 0.0 {
            return Err(DomainError::Validation("quantity must be positive".into()));
        }

        let mut records = self.records.write().await;
        if !records.clients.iter().any(|c| c.id == input.client_id) {
            return Err(not_found("client", input.client_id));
        }
        if let Some(team_id) = input.team_id {
            if !records.teams.iter().any(|t| t.id == team_id) {
                return Err(not_found("team", team_id));
            }
        }
        if let Some(commodity_id) = input.commodity_id {
            if !records.commodities.iter().any(|c| c.id == commodity_id) {
                return Err(not_found("commodity", commodity_id));
            }
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            client_id: input.client_id,
            team_id: input.team_id,
            commodity_id: input.commodity_id,
            status: OrderStatus::Pending,
            quantity: input.quantity,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        records.orders.push(order.clone());
        Ok(order)
    }

    async fn create_invoice(&self, input: NewInvoice) -> RepoResult<Invoice> {
        if input.amount_cents <= 0 {
            return Err(DomainError::Validation("amount must be positive".into()));
        }

        let mut records = self.records.write().await;
        let client_id = records
            .orders
            .iter()
            .find(|o| o.id == input.order_id)
            .map(|o| o.client_id)
            .ok_or_else(|| not_found("order", input.order_id))?;

        let invoice = Invoice {
            id: Uuid::new_v4(),
            order_id: input.order_id,
            client_id,
            amount_cents: input.amount_cents,
            status: InvoiceStatus::Draft,
            issued_at: Utc::now(),
            due_at: input.due_at,
        };
        records.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> RepoResult<Order> {
        let mut records = self.records.write().await;
        let order = records
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| not_found("order", id))?;

        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_invoice_status(&self, id: Uuid, status: InvoiceStatus) -> RepoResult<Invoice> {
        let mut records = self.records.write().await;
        let invoice = records
            .invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| not_found("invoice", id))?;

        if invoice.status == InvoiceStatus::Void && status != InvoiceStatus::Void {
            return Err(DomainError::Validation("void invoices cannot be reopened".into()));
        }

        invoice.status = status;
        Ok(invoice.clone())
    }

    async fn summary(&self) -> RepoResult<DashboardSummary> {
        let records = self.records.read().await;

        let orders_by_status = OrderStatus::ALL
            .iter()
            .map(|s| (*s, records.orders.iter().filter(|o| o.status == *s).count()))
            .collect();
        let invoices_by_status = InvoiceStatus::ALL
            .iter()
            .map(|s| (*s, records.invoices.iter().filter(|i| i.status == *s).count()))
            .collect();
        let outstanding_cents = records
            .invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Sent)
            .map(|i| i.amount_cents)
            .sum();
        let now = Utc::now();
        let overdue_count = records.invoices.iter().filter(|i| i.is_overdue(now)).count();

        Ok(DashboardSummary {
            orders_by_status,
            invoices_by_status,
            outstanding_cents,
            overdue_count,
            client_count: records.clients.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_summary() {
        let store = MemoryRecordStore::seeded();
        let summary = store.summary().await.unwrap();

        assert_eq!(summary.client_count, 2);
        assert_eq!(summary.outstanding_cents, 185_000);
        assert_eq!(summary.overdue_count, 0);
        assert!(summary
            .orders_by_status
            .contains(&(OrderStatus::Scheduled, 1)));
    }

    #[tokio::test]
    async fn test_sent_invoice_past_due_counts_as_overdue() {
        let store = MemoryRecordStore::seeded();
        let order = store.list_orders(OrderFilter::default()).await.unwrap().remove(0);

        let late = store
            .create_invoice(NewInvoice {
                order_id: order.id,
                amount_cents: 5_000,
                due_at: Some(Utc::now() - Duration::days(3)),
            })
            .await
            .unwrap();
        // Drafts are never overdue
        assert_eq!(store.summary().await.unwrap().overdue_count, 0);

        store
            .update_invoice_status(late.id, InvoiceStatus::Sent)
            .await
            .unwrap();
        let summary = store.summary().await.unwrap();
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.outstanding_cents, 190_000);
    }

    #[tokio::test]
    async fn test_create_order_requires_client() {
        let store = MemoryRecordStore::seeded();
        let err = store
            .create_order(NewOrder {
                client_id: Uuid::new_v4(),
                team_id: None,
                commodity_id: None,
                quantity: 10.0,
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { ref entity_type, .. } if entity_type == "client"));
    }

    #[tokio::test]
    async fn test_duplicate_client_rejected() {
        let store = MemoryRecordStore::seeded();
        let err = store
            .create_client(NewClient {
                name: "harbor grain co".into(),
                email: None,
                phone: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_order_filter_and_status_update() {
        let store = MemoryRecordStore::seeded();
        let clients = store.list_clients().await.unwrap();
        let order = store
            .create_order(NewOrder {
                client_id: clients[1].id,
                team_id: None,
                commodity_id: None,
                quantity: 5.0,
                notes: None,
            })
            .await
            .unwrap();

        let pending = store
            .list_orders(OrderFilter {
                status: Some(OrderStatus::Pending),
                client_id: None,
            })
            .await
            .unwrap();
        assert_eq!(pending, vec![order.clone()]);

        store
            .update_order_status(order.id, OrderStatus::InProgress)
            .await
            .unwrap();
        let pending = store
            .list_orders(OrderFilter {
                status: Some(OrderStatus::Pending),
                client_id: None,
            })
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_void_invoice_stays_void() {
        let store = MemoryRecordStore::seeded();
        let invoice = store.list_invoices(None).await.unwrap().remove(0);

        store
            .update_invoice_status(invoice.id, InvoiceStatus::Void)
            .await
            .unwrap();
        let err = store
            .update_invoice_status(invoice.id, InvoiceStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
