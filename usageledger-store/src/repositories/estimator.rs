//! Estimator (C6): converts a contiguous rate-sample series into hourly
//! BillingEvents via piecewise-linear (trapezoidal) integration.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

use usageledger_core::error::{StoreError, StoreResult};
use usageledger_core::time::{elapsed_seconds, floor_to_hour};

use crate::models::{BillingEvent, RateSample};
use crate::repositories::catalogue::CatalogueRepository;
use crate::store::Store;

/// Fixed namespace for the deterministic UUIDv5 of generated billing
/// events. Determinism makes regeneration idempotent: the window loop can
/// be re-run with no new samples and produce no new rows.
const ESTIMATE_NAMESPACE: Uuid = Uuid::from_u128(0x67f9a35c_567c_4a30_b51d_2fc64328bd55);

fn window_event_uuid(workspace: &str, sku: &str, window_start: DateTime<Utc>) -> Uuid {
    let name = format!("{workspace}-{sku}-{}", window_start.to_rfc3339());
    Uuid::new_v5(&ESTIMATE_NAMESPACE, name.as_bytes())
}

fn row_to_sample(row: &sqlx::postgres::PgRow) -> Result<RateSample, StoreError> {
    Ok(RateSample {
        uuid: row.try_get("uuid").map_err(StoreError::Transient)?,
        sample_time: row.try_get("sample_time").map_err(StoreError::Transient)?,
        item_id: row.try_get("item_id").map_err(StoreError::Transient)?,
        workspace: row.try_get("workspace").map_err(StoreError::Transient)?,
        user: row.try_get("user").map_err(StoreError::Transient)?,
        rate: row.try_get("rate").map_err(StoreError::Transient)?,
    })
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<BillingEvent, StoreError> {
    Ok(BillingEvent {
        uuid: row.try_get("uuid").map_err(StoreError::Transient)?,
        event_start: row.try_get("event_start").map_err(StoreError::Transient)?,
        event_end: row.try_get("event_end").map_err(StoreError::Transient)?,
        item_id: row.try_get("item_id").map_err(StoreError::Transient)?,
        workspace: row.try_get("workspace").map_err(StoreError::Transient)?,
        user: row.try_get("user").map_err(StoreError::Transient)?,
        quantity: row.try_get("quantity").map_err(StoreError::Transient)?,
    })
}

/// The predecessor, in-window and successor samples needed to integrate one
/// window `[start, end)`.
pub struct IntervalData {
    pub predecessor: Option<RateSample>,
    pub in_window: Vec<RateSample>,
    pub successor: Option<RateSample>,
}

#[async_trait]
pub trait EstimatorRepository {
    async fn find_latest_billing_event(
        &self,
        workspace: &str,
        sku: &str,
    ) -> StoreResult<Option<BillingEvent>>;

    async fn find_earliest_sample(
        &self,
        workspace: &str,
        item_id: Uuid,
    ) -> StoreResult<Option<RateSample>>;

    async fn find_data_for_interval(
        &self,
        workspace: &str,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<IntervalData>;

    /// Integrate the rate-sample series over `[start, end)` for `(workspace,
    /// item_id)` using the trapezoidal rule and the boundary conventions
    /// described in SPEC_FULL §4.5. Returns `None` if fewer than two samples
    /// exist in the series (quantity is undefined, not zero).
    async fn calculate_consumption_for_interval(
        &self,
        workspace: &str,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<f64>>;

    /// Generate hourly BillingEvents for `(workspace, sku)` up to `upto`,
    /// continuing from the frontier of the latest previously generated
    /// event, or from the hour of the earliest sample if none exists.
    async fn generate_upto(&self, workspace: &str, sku: &str, upto: DateTime<Utc>) -> StoreResult<()>;
}

#[async_trait]
impl EstimatorRepository for Store {
    async fn find_latest_billing_event(
        &self,
        workspace: &str,
        sku: &str,
    ) -> StoreResult<Option<BillingEvent>> {
        let row = sqlx::query(
            r#"
            SELECT e.uuid, e.event_start, e.event_end, e.item_id, e.workspace, e."user", e.quantity
            FROM billing_event e
            JOIN billing_item i ON i.uuid = e.item_id
            WHERE e.workspace = $1 AND i.sku = $2
            ORDER BY e.event_end DESC
            LIMIT 1
            "#,
        )
        .bind(workspace)
        .bind(sku)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        row.as_ref().map(row_to_event).transpose()
    }

    async fn find_earliest_sample(
        &self,
        workspace: &str,
        item_id: Uuid,
    ) -> StoreResult<Option<RateSample>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, sample_time, item_id, workspace, "user", rate
            FROM billable_resource_consumption_rate_sample
            WHERE workspace = $1 AND item_id = $2
            ORDER BY sample_time ASC
            LIMIT 1
            "#,
        )
        .bind(workspace)
        .bind(item_id)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        row.as_ref().map(row_to_sample).transpose()
    }

    async fn find_data_for_interval(
        &self,
        workspace: &str,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<IntervalData> {
        let predecessor_row = sqlx::query(
            r#"
            SELECT uuid, sample_time, item_id, workspace, "user", rate
            FROM billable_resource_consumption_rate_sample
            WHERE workspace = $1 AND item_id = $2 AND sample_time <= $3
            ORDER BY sample_time DESC
            LIMIT 1
            "#,
        )
        .bind(workspace)
        .bind(item_id)
        .bind(start)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        let in_window_rows = sqlx::query(
            r#"
            SELECT uuid, sample_time, item_id, workspace, "user", rate
            FROM billable_resource_consumption_rate_sample
            WHERE workspace = $1 AND item_id = $2 AND sample_time > $3 AND sample_time < $4
            ORDER BY sample_time ASC
            "#,
        )
        .bind(workspace)
        .bind(item_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        let successor_row = sqlx::query(
            r#"
            SELECT uuid, sample_time, item_id, workspace, "user", rate
            FROM billable_resource_consumption_rate_sample
            WHERE workspace = $1 AND item_id = $2 AND sample_time >= $3
            ORDER BY sample_time ASC
            LIMIT 1
            "#,
        )
        .bind(workspace)
        .bind(item_id)
        .bind(end)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        Ok(IntervalData {
            predecessor: predecessor_row.as_ref().map(row_to_sample).transpose()?,
            in_window: in_window_rows.iter().map(row_to_sample).collect::<Result<_, _>>()?,
            successor: successor_row.as_ref().map(row_to_sample).transpose()?,
        })
    }

    async fn calculate_consumption_for_interval(
        &self,
        workspace: &str,
        item_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<f64>> {
        let data = self.find_data_for_interval(workspace, item_id, start, end).await?;
        Ok(integrate_window(&data, start, end))
    }

    async fn generate_upto(&self, workspace: &str, sku: &str, upto: DateTime<Utc>) -> StoreResult<()> {
        let item = self
            .get_item(sku)
            .await
            .map_err(|e| match e {
                usageledger_core::error::CatalogueError::Store(s) => s,
                other => StoreError::Integrity(other.to_string()),
            })?
            .ok_or_else(|| StoreError::NotFound(format!("billing item {sku}")))?;

        let last_estimate = self.find_latest_billing_event(workspace, sku).await?;

        let mut generate_from = match last_estimate {
            Some(ev) => ev.event_end,
            None => {
                let earliest = self.find_earliest_sample(workspace, item.uuid).await?;
                match earliest {
                    Some(sample) => floor_to_hour(sample.sample_time),
                    None => return Ok(()),
                }
            }
        };

        let mut generate_to = floor_to_hour(generate_from + Duration::hours(1));

        while generate_to <= upto {
            let consumption = self
                .calculate_consumption_for_interval(workspace, item.uuid, generate_from, generate_to)
                .await?;

            if let Some(quantity) = consumption {
                let uuid = window_event_uuid(workspace, sku, generate_from);

                tracing::debug!(
                    workspace,
                    sku,
                    window_start = %generate_from,
                    window_end = %generate_to,
                    quantity,
                    "generating estimated BillingEvent"
                );

                sqlx::query(
                    r#"
                    INSERT INTO billing_event (uuid, event_start, event_end, item_id, workspace, "user", quantity)
                    VALUES ($1, $2, $3, $4, $5, NULL, $6)
                    ON CONFLICT (uuid) DO NOTHING
                    "#,
                )
                .bind(uuid)
                .bind(generate_from)
                .bind(generate_to)
                .bind(item.uuid)
                .bind(workspace)
                .bind(quantity)
                .execute(self.pool())
                .await
                .map_err(StoreError::Transient)?;
            }

            generate_from = generate_to;
            generate_to = floor_to_hour(generate_from + Duration::hours(1));
        }

        Ok(())
    }
}

fn interpolate(s0: &RateSample, s1: &RateSample, t: DateTime<Utc>) -> f64 {
    let span = elapsed_seconds(s0.sample_time, s1.sample_time);
    if span <= 0.0 {
        return s0.rate;
    }
    let elapsed = elapsed_seconds(s0.sample_time, t);
    s0.rate + (elapsed / span) * (s1.rate - s0.rate)
}

/// Pure trapezoidal integration over a window given its predecessor,
/// in-window samples and successor. Pulled out of the repository method so
/// the estimator's core math can be unit tested without a database.
fn integrate_window(data: &IntervalData, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    // Zero or one relevant sample leaves the quantity undefined, not zero:
    // there is nothing to interpolate or extrapolate between.
    let relevant_samples =
        data.in_window.len() + data.predecessor.is_some() as usize + data.successor.is_some() as usize;
    if relevant_samples < 2 {
        return None;
    }

    // With no sample inside the window but both boundaries present, the
    // window ran at the steadily interpolated rate between predecessor and
    // successor throughout.
    if data.in_window.is_empty() {
        let pred = data.predecessor.as_ref().expect("relevant_samples >= 2 with empty in_window");
        let succ = data.successor.as_ref().expect("relevant_samples >= 2 with empty in_window");
        let v_start = interpolate(pred, succ, start);
        let v_end = interpolate(pred, succ, end);
        return Some(elapsed_seconds(start, end) * (v_start + v_end) / 2.0);
    }

    let first = data.in_window.first().expect("checked non-empty above");
    let last = data.in_window.last().expect("checked non-empty above");

    let mut vertices: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(data.in_window.len() + 3);

    match &data.predecessor {
        Some(pred) => vertices.push((start, interpolate(pred, first, start))),
        None => {
            // No predecessor: resource assumed not to exist before the
            // first sample. Rate is 0 up to that sample, then steps up to
            // the observed value.
            vertices.push((start, 0.0));
            vertices.push((first.sample_time, 0.0));
        }
    }

    for sample in &data.in_window {
        vertices.push((sample.sample_time, sample.rate));
    }

    match &data.successor {
        Some(succ) => vertices.push((end, interpolate(last, succ, end))),
        None => {
            // No successor: resource assumed to cease at the last observed
            // sample. Rate steps down to 0 there and contributes nothing
            // for the remainder of the window.
            vertices.push((last.sample_time, 0.0));
            vertices.push((end, 0.0));
        }
    }

    let mut quantity = 0.0;
    for window in vertices.windows(2) {
        let (t0, r0) = window[0];
        let (t1, r1) = window[1];
        if t1 <= t0 {
            continue;
        }
        quantity += elapsed_seconds(t0, t1) * (r0 + r1) / 2.0;
    }

    Some(quantity)
}
