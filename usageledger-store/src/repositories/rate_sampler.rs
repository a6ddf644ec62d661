//! RateSampler (C5): ingestion of consumption-rate samples, driving the
//! Estimator forward for the sample's `(workspace, sku)` pair.

use async_trait::async_trait;
use uuid::Uuid;

use usageledger_core::error::{IngestError, IngestResult, StoreError, StoreResult};
use usageledger_core::time::floor_to_hour;

use crate::messages::ConsumptionRateSampleMessage;
use crate::repositories::catalogue::CatalogueRepository;
use crate::repositories::estimator::EstimatorRepository;
use crate::store::{classify_sqlx_error, Store};

#[async_trait]
pub trait RateSamplerRepository {
    async fn insert_sample(
        &self,
        msg: &ConsumptionRateSampleMessage,
    ) -> StoreResult<Option<Uuid>>;
}

async fn try_insert(
    store: &Store,
    msg: &ConsumptionRateSampleMessage,
) -> Result<Option<Uuid>, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO billable_resource_consumption_rate_sample
            (uuid, sample_time, item_id, workspace, "user", rate)
        VALUES ($1, $2, (SELECT uuid FROM billing_item WHERE sku = $3), $4, $5, $6)
        ON CONFLICT (uuid) DO NOTHING
        "#,
    )
    .bind(msg.uuid)
    .bind(msg.sample_time)
    .bind(&msg.sku)
    .bind(&msg.workspace)
    .bind(msg.user)
    .bind(msg.rate)
    .execute(store.pool())
    .await?;

    Ok(if result.rows_affected() == 1 { Some(msg.uuid) } else { None })
}

#[async_trait]
impl RateSamplerRepository for Store {
    async fn insert_sample(
        &self,
        msg: &ConsumptionRateSampleMessage,
    ) -> StoreResult<Option<Uuid>> {
        match try_insert(self, msg).await {
            Ok(uuid) => {
                if uuid.is_some() {
                    tracing::debug!(uuid = %msg.uuid, "recorded rate sample");
                } else {
                    tracing::info!(uuid = %msg.uuid, "received duplicate rate sample");
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
                    "IntegrityError recording rate sample, assuming missing BillingItem"
                );
                self.ensure_sku(&msg.sku).await.map_err(|e| match e {
                    usageledger_core::error::CatalogueError::Store(s) => s,
                    other => StoreError::Integrity(other.to_string()),
                })?;

                try_insert(self, msg).await.map_err(classify_sqlx_error)
            }
        }
    }
}

/// Top-level entrypoint: record the sample, then drive the Estimator
/// forward to the start of the clock hour containing it.
pub async fn ingest_sample(store: &Store, msg: &ConsumptionRateSampleMessage) -> IngestResult<()> {
    store.insert_sample(msg).await?;

    let upto = floor_to_hour(msg.sample_time);
    store
        .generate_upto(&msg.workspace, &msg.sku, upto)
        .await
        .map_err(|e| IngestError::Store(e))?;

    Ok(())
}
