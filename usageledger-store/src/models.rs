//! Domain entities. These mirror the tables in `migrations/0001_init.sql`
//! field for field; repositories map rows to and from them directly rather
//! than through an intermediate DTO layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Records that a named workspace belongs to a billing account. Created on
/// first observation; never updated or deleted (workspaces do not move).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceAccount {
    pub workspace: String,
    pub account: Uuid,
}

/// A sellable product, a.k.a. SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingItem {
    pub uuid: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
}

impl BillingItem {
    /// A freshly observed SKU with no configured name or unit.
    pub fn stub(uuid: Uuid, sku: impl Into<String>) -> Self {
        BillingItem {
            uuid,
            sku: sku.into(),
            name: String::new(),
            unit: String::new(),
        }
    }
}

/// One entry in an item's price timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingItemPrice {
    pub uuid: Uuid,
    pub item_id: Uuid,
    pub price: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub configured_at: DateTime<Utc>,
}

/// A durable record of consumption over a time interval, in the item's unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingEvent {
    pub uuid: Uuid,
    pub event_start: DateTime<Utc>,
    pub event_end: DateTime<Utc>,
    pub item_id: Uuid,
    pub workspace: String,
    pub user: Option<Uuid>,
    pub quantity: f64,
}

/// An instantaneous measurement of consumption rate (units per second).
#[derive(Debug, Clone, PartialEq)]
pub struct RateSample {
    pub uuid: Uuid,
    pub sample_time: DateTime<Utc>,
    pub item_id: Uuid,
    pub workspace: String,
    pub user: Option<Uuid>,
    pub rate: f64,
}

/// A BillingEvent joined with the SKU it was billed against, the shape
/// `EventQuery` and the HTTP view both need.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingEventWithSku {
    pub event: BillingEvent,
    pub sku: String,
}
