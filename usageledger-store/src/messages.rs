//! Wire schemas for the three message-bus topics (§6). These are decoded by
//! the ingest dispatcher and passed straight into the repository methods
//! below; nothing reinterprets them once they're in this shape.
//!
//! Timestamp fields use `deserialize_utc_timestamp` rather than chrono's
//! default `DateTime<Utc>` deserialization: a zone-less value is accepted
//! and assumed to already be UTC, per the zone-less-input contract, instead
//! of being rejected as a permanent validation error.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use usageledger_core::time::deserialize_utc_timestamp;

#[derive(Debug, Clone, Deserialize)]
pub struct BillingEventMessage {
    pub uuid: Uuid,
    #[serde(deserialize_with = "deserialize_utc_timestamp")]
    pub event_start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_utc_timestamp")]
    pub event_end: DateTime<Utc>,
    pub sku: String,
    pub workspace: String,
    #[serde(default)]
    pub user: Option<Uuid>,
    pub quantity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceSettingsMessage {
    /// The workspace name. Called `name` on the wire to mirror the upstream
    /// workspace-management event.
    pub name: String,
    pub account: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionRateSampleMessage {
    pub uuid: Uuid,
    #[serde(deserialize_with = "deserialize_utc_timestamp")]
    pub sample_time: DateTime<Utc>,
    pub sku: String,
    pub workspace: String,
    #[serde(default)]
    pub user: Option<Uuid>,
    pub rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn billing_event_accepts_zoneless_timestamps() {
        let json = r#"{
            "uuid": "11111111-1111-1111-1111-111111111111",
            "event_start": "2025-01-01T00:00:00",
            "event_end": "2025-01-01T01:00:00",
            "sku": "sku1",
            "workspace": "workspace1",
            "quantity": 1.0
        }"#;

        let msg: BillingEventMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.event_start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(msg.event_end, Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn rate_sample_accepts_zoned_and_zoneless_timestamps() {
        let zoned = r#"{
            "uuid": "11111111-1111-1111-1111-111111111111",
            "sample_time": "2025-01-01T00:00:00Z",
            "sku": "sku1",
            "workspace": "workspace1",
            "rate": 1.0
        }"#;
        let zoneless = r#"{
            "uuid": "11111111-1111-1111-1111-111111111111",
            "sample_time": "2025-01-01T00:00:00",
            "sku": "sku1",
            "workspace": "workspace1",
            "rate": 1.0
        }"#;

        let from_zoned: ConsumptionRateSampleMessage = serde_json::from_str(zoned).unwrap();
        let from_zoneless: ConsumptionRateSampleMessage = serde_json::from_str(zoneless).unwrap();
        assert_eq!(from_zoned.sample_time, from_zoneless.sample_time);
    }
}
