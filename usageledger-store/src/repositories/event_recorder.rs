//! EventRecorder (C4): idempotent insertion of discrete billing events.

use async_trait::async_trait;
use uuid::Uuid;

use usageledger_core::error::{StoreError, StoreResult};

use crate::messages::BillingEventMessage;
use crate::repositories::catalogue::CatalogueRepository;
use crate::store::{classify_sqlx_error, Store};

#[async_trait]
pub trait EventRecorderRepository {
    /// Insert the event described by `msg`. Returns the inserted UUID, or
    /// `None` if an event with that UUID already existed (the row is never
    /// overwritten). Recovers once from a missing-SKU integrity violation by
    /// creating a stub item and retrying.
    async fn insert_event(&self, msg: &BillingEventMessage) -> StoreResult<Option<Uuid>>;
}

async fn try_insert(store: &Store, msg: &BillingEventMessage) -> Result<Option<Uuid>, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO billing_event (uuid, event_start, event_end, item_id, workspace, "user", quantity)
        VALUES ($1, $2, $3, (SELECT uuid FROM billing_item WHERE sku = $4), $5, $6, $7)
        ON CONFLICT (uuid) DO NOTHING
        "#,
    )
    .bind(msg.uuid)
    .bind(msg.event_start)
    .bind(msg.event_end)
    .bind(&msg.sku)
    .bind(&msg.workspace)
    .bind(msg.user)
    .bind(msg.quantity)
    .execute(store.pool())
    .await?;

    Ok(if result.rows_affected() == 1 { Some(msg.uuid) } else { None })
}

#[async_trait]
impl EventRecorderRepository for Store {
    async fn insert_event(&self, msg: &BillingEventMessage) -> StoreResult<Option<Uuid>> {
        match try_insert(self, msg).await {
            Ok(uuid) => {
                if uuid.is_some() {
                    tracing::debug!(uuid = %msg.uuid, "recorded BillingEvent");
                } else {
                    tracing::info!(uuid = %msg.uuid, "received duplicate BillingEvent");
                }
                Ok(uuid)
            }
            Err(e) => {
                let classified = classify_sqlx_error(e);
                if !classified.is_missing_reference() {
                    return Err(classified);
                }

                tracing::warn!(
                    sku = %msg.sku,
                    "IntegrityError recording BillingEvent, assuming missing BillingItem"
                );
                self.ensure_sku(&msg.sku).await.map_err(|e| match e {
                    usageledger_core::error::CatalogueError::Store(s) => s,
                    other => StoreError::Integrity(other.to_string()),
                })?;

                let uuid = try_insert(self, msg).await.map_err(classify_sqlx_error)?;
                if uuid.is_some() {
                    tracing::debug!(uuid = %msg.uuid, "recorded BillingEvent after SKU recovery");
                }
                Ok(uuid)
            }
        }
    }
}
