//! HTTP view objects (§4.8, §6). Timestamps are rendered as
//! `YYYY-MM-DDTHH:MM:SSZ`, matching the contract exactly rather than the
//! default RFC 3339-with-fractional-seconds `chrono` would otherwise emit.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use usageledger_store::models::{BillingEventWithSku, BillingItem, BillingItemPrice};

fn serialize_timestamp<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

fn serialize_opt_timestamp<S: Serializer>(
    t: &Option<DateTime<Utc>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => serialize_timestamp(t, s),
        None => s.serialize_none(),
    }
}

/// `{uuid, event_start, event_end, item, workspace, quantity}` — the `user`
/// field is intentionally omitted from this view (§9, Open Question 2).
#[derive(Debug, Serialize)]
pub struct BillingEventView {
    pub uuid: Uuid,
    #[serde(serialize_with = "serialize_timestamp")]
    pub event_start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub event_end: DateTime<Utc>,
    pub item: String,
    pub workspace: String,
    pub quantity: f64,
}

impl From<BillingEventWithSku> for BillingEventView {
    fn from(row: BillingEventWithSku) -> Self {
        BillingEventView {
            uuid: row.event.uuid,
            event_start: row.event.event_start,
            event_end: row.event.event_end,
            item: row.sku,
            workspace: row.event.workspace,
            quantity: row.event.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BillingItemView {
    pub uuid: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
}

impl From<BillingItem> for BillingItemView {
    fn from(item: BillingItem) -> Self {
        BillingItemView { uuid: item.uuid, sku: item.sku, name: item.name, unit: item.unit }
    }
}

#[derive(Debug, Serialize)]
pub struct BillingItemPriceView {
    pub uuid: Uuid,
    pub sku: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub valid_from: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_timestamp")]
    pub valid_until: Option<DateTime<Utc>>,
    pub price: f64,
}

impl From<(BillingItemPrice, String)> for BillingItemPriceView {
    fn from((price, sku): (BillingItemPrice, String)) -> Self {
        BillingItemPriceView {
            uuid: price.uuid,
            sku,
            valid_from: price.valid_from,
            valid_until: price.valid_until,
            price: price.price.to_string().parse().unwrap_or(f64::NAN),
        }
    }
}
