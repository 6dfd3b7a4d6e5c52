//! # FieldOps Dashboard - Domain Model
//!
//! Core entities and value objects for the logistics/inspection admin
//! dashboard: teams, units, clients, commodities, orders and invoices,
//! plus the invalidation vocabulary shared by the cache layer and the API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// INVALIDATION VOCABULARY
// =============================================================================

/// Logical grouping of cached data that is invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Orders,
    Invoices,
    Clients,
    Teams,
    Units,
    Commodities,
    /// Every category at once
    All,
}

impl Category {
    /// Every category except `All`.
    pub const CONCRETE: [Self; 6] = [
        Self::Orders,
        Self::Invoices,
        Self::Clients,
        Self::Teams,
        Self::Units,
        Self::Commodities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Invoices => "invoices",
            Self::Clients => "clients",
            Self::Teams => "teams",
            Self::Units => "units",
            Self::Commodities => "commodities",
            Self::All => "all",
        }
    }

    /// Concrete categories this one stands for.
    #[must_use]
    pub fn expand(self) -> Vec<Self> {
        match self {
            Self::All => Self::CONCRETE.to_vec(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orders" | "order" => Ok(Self::Orders),
            "invoices" | "invoice" => Ok(Self::Invoices),
            "clients" | "client" => Ok(Self::Clients),
            "teams" | "team" => Ok(Self::Teams),
            "units" | "unit" => Ok(Self::Units),
            "commodities" | "commodity" => Ok(Self::Commodities),
            "all" => Ok(Self::All),
            other => Err(DomainError::UnknownCategory(other.to_string())),
        }
    }
}

/// "This data changed" notice. Never persisted, only broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub category: Category,
    pub entity_id: Option<Uuid>,
    /// Epoch milliseconds at which the event was raised
    pub raised_at: i64,
    /// Bus instance that raised the event
    pub origin: Uuid,
}

impl InvalidationEvent {
    pub fn new(category: Category, entity_id: Option<Uuid>, raised_at: i64, origin: Uuid) -> Self {
        Self {
            category,
            entity_id,
            raised_at,
            origin,
        }
    }

    /// Whether a consumer of `category` should react to this event.
    #[must_use]
    pub fn affects(&self, category: Category) -> bool {
        self.category == Category::All || category == Category::All || self.category == category
    }
}

/// Entity types listed by the dashboard.
pub trait Resource {
    /// Category invalidated when an entity of this type changes
    const CATEGORY: Category;
    /// Resource name used as the cache key prefix for listings
    const RESOURCE: &'static str;

    fn id(&self) -> Uuid;
}

// =============================================================================
// ENUMS
// =============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Scheduled,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub const ALL: [Self; 4] = [Self::Draft, Self::Sent, Self::Paid, Self::Void];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Field team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Inspection unit belonging to a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub active: bool,
}

/// Customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inspected goods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub id: Uuid,
    pub name: String,
    pub unit_of_measure: String,
}

/// Inspection order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    pub team_id: Option<Uuid>,
    pub commodity_id: Option<Uuid>,
    pub status: OrderStatus,
    pub quantity: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice raised against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub amount_cents: i64,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
}

impl Invoice {
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, InvoiceStatus::Sent) && self.due_at.is_some_and(|due| due < now)
    }
}

macro_rules! impl_resource {
    ($ty:ty, $category:expr, $resource:literal) => {
        impl Resource for $ty {
            const CATEGORY: Category = $category;
            const RESOURCE: &'static str = $resource;

            fn id(&self) -> Uuid {
                self.id
            }
        }
    };
}

impl_resource!(Team, Category::Teams, "teams");
impl_resource!(Unit, Category::Units, "units");
impl_resource!(Client, Category::Clients, "clients");
impl_resource!(Commodity, Category::Commodities, "commodities");
impl_resource!(Order, Category::Orders, "orders");
impl_resource!(Invoice, Category::Invoices, "invoices");

// =============================================================================
// QUERY/FILTER TYPES
// =============================================================================

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build pagination, clamping to sane bounds
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            page: page.unwrap_or(defaults.page).max(1),
            per_page: per_page
                .unwrap_or(defaults.per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
}

impl<T: Clone> Page<T> {
    /// Slice an already filtered and ordered collection
    #[must_use]
    pub fn from_slice(all: &[T], pagination: Pagination) -> Self {
        let items = all
            .iter()
            .skip(pagination.offset())
            .take(pagination.per_page as usize)
            .cloned()
            .collect();

        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total: all.len(),
        }
    }
}

/// Dashboard headline numbers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub orders_by_status: Vec<(OrderStatus, usize)>,
    pub invoices_by_status: Vec<(InvoiceStatus, usize)>,
    pub outstanding_cents: i64,
    /// Sent invoices past their due date
    pub overdue_count: usize,
    pub client_count: usize,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Unknown invalidation category: {0}")]
    UnknownCategory(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
