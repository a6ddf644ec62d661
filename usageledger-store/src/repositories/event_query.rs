//! EventQuery (C7): paginated, totally-ordered query of billing events.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use sqlx::Row;
use uuid::Uuid;

use usageledger_core::error::{QueryError, QueryResult, StoreError};

use crate::models::BillingEventWithSku;
use crate::store::Store;

pub const DEFAULT_INTERNAL_LIMIT: i64 = 5000;
pub const DEFAULT_HTTP_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    None,
    Day,
    Month,
}

#[derive(Debug, Clone, Default)]
pub struct EventQueryFilter {
    pub workspace: Option<String>,
    pub account: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub after: Option<Uuid>,
    pub limit: i64,
    pub aggregation: Option<Aggregation>,
}

impl EventQueryFilter {
    pub fn internal_default() -> Self {
        EventQueryFilter { limit: DEFAULT_INTERNAL_LIMIT, ..Default::default() }
    }
}

#[async_trait]
pub trait EventQueryRepository {
    async fn find_events(&self, filter: &EventQueryFilter) -> QueryResult<Vec<BillingEventWithSku>>;
}

fn row_to_event_with_sku(row: &sqlx::postgres::PgRow) -> Result<BillingEventWithSku, StoreError> {
    use crate::models::BillingEvent;

    Ok(BillingEventWithSku {
        event: BillingEvent {
            uuid: row.try_get("uuid").map_err(StoreError::Transient)?,
            event_start: row.try_get("event_start").map_err(StoreError::Transient)?,
            event_end: row.try_get("event_end").map_err(StoreError::Transient)?,
            item_id: row.try_get("item_id").map_err(StoreError::Transient)?,
            workspace: row.try_get("workspace").map_err(StoreError::Transient)?,
            user: row.try_get("user").map_err(StoreError::Transient)?,
            quantity: row.try_get("quantity").map_err(StoreError::Transient)?,
        },
        sku: row.try_get("sku").map_err(StoreError::Transient)?,
    })
}

/// The cursor value of an event for the total order `(event_start,
/// event_end, workspace, uuid)`.
async fn cursor_of(store: &Store, after: Uuid) -> QueryResult<Option<(DateTime<Utc>, DateTime<Utc>, String, Uuid)>> {
    let row = sqlx::query(
        "SELECT event_start, event_end, workspace, uuid FROM billing_event WHERE uuid = $1",
    )
    .bind(after)
    .fetch_optional(store.pool())
    .await
    .map_err(StoreError::Transient)?;

    row.map(|r| {
        Ok((
            r.try_get("event_start").map_err(StoreError::Transient)?,
            r.try_get("event_end").map_err(StoreError::Transient)?,
            r.try_get("workspace").map_err(StoreError::Transient)?,
            r.try_get("uuid").map_err(StoreError::Transient)?,
        ))
    })
    .transpose()
    .map_err(Into::into)
}

#[async_trait]
impl EventQueryRepository for Store {
    async fn find_events(&self, filter: &EventQueryFilter) -> QueryResult<Vec<BillingEventWithSku>> {
        match filter.aggregation.unwrap_or(Aggregation::None) {
            Aggregation::None => find_events_plain(self, filter).await,
            agg => find_events_aggregated(self, filter, agg).await,
        }
    }
}

async fn find_events_plain(
    store: &Store,
    filter: &EventQueryFilter,
) -> QueryResult<Vec<BillingEventWithSku>> {
    let cursor = match filter.after {
        Some(after) => cursor_of(store, after).await?,
        None => None,
    };

    // Total order is (event_start, event_end, workspace, uuid). The
    // strictly-greater-than predicate over a 4-tuple expands into a
    // 4-branch OR-of-ANDs form below. `$N` placeholders are assigned in a
    // single linear pass so they line up exactly with the bind() calls
    // further down.
    let mut sql = String::from(
        r#"
        SELECT e.uuid, e.event_start, e.event_end, e.item_id, e.workspace, e."user", e.quantity, i.sku
        FROM billing_event e
        JOIN billing_item i ON i.uuid = e.item_id
        "#,
    );
    if filter.account.is_some() {
        sql.push_str(" JOIN workspace_account wa ON wa.workspace = e.workspace ");
    }
    sql.push_str(" WHERE TRUE ");

    let mut idx = 0;
    let mut next = || {
        idx += 1;
        idx
    };

    let workspace_param = filter.workspace.as_ref().map(|_| next());
    if let Some(p) = workspace_param {
        sql.push_str(&format!(" AND e.workspace = ${p} "));
    }

    let account_param = filter.account.map(|_| next());
    if let Some(p) = account_param {
        sql.push_str(&format!(" AND wa.account = ${p} "));
    }

    let start_param = filter.start.map(|_| next());
    if let Some(p) = start_param {
        sql.push_str(&format!(" AND e.event_start >= ${p} "));
    }

    let end_param = filter.end.map(|_| next());
    if let Some(p) = end_param {
        sql.push_str(&format!(" AND e.event_end < ${p} "));
    }

    let cursor_params = cursor.as_ref().map(|_| (next(), next(), next(), next(), next(), next(), next(), next(), next(), next()));
    if let Some((a, b, c, d, e, f, g, h, i, j)) = cursor_params {
        sql.push_str(&format!(
            r#" AND (
                e.event_start > ${a}
                OR (e.event_start = ${b} AND e.event_end > ${c})
                OR (e.event_start = ${d} AND e.event_end = ${e} AND e.workspace > ${f})
                OR (e.event_start = ${g} AND e.event_end = ${h} AND e.workspace = ${i} AND e.uuid > ${j})
            ) "#
        ));
    }

    let limit_param = next();
    sql.push_str(&format!(
        " ORDER BY e.event_start ASC, e.event_end ASC, e.workspace ASC, e.uuid ASC LIMIT ${limit_param}"
    ));

    let mut query = sqlx::query(&sql);

    if let Some(ws) = &filter.workspace {
        query = query.bind(ws);
    }
    if let Some(acc) = filter.account {
        query = query.bind(acc);
    }
    if let Some(start) = filter.start {
        query = query.bind(start);
    }
    if let Some(end) = filter.end {
        query = query.bind(end);
    }
    if let Some((event_start, event_end, workspace, uuid)) = &cursor {
        // Bind order must mirror the placeholder order in the OR-of-ANDs
        // predicate above exactly: (a..j) = ES,ES,EE,ES,EE,WS,ES,EE,WS,UUID.
        query = query.bind(event_start); // a
        query = query.bind(event_start); // b
        query = query.bind(event_end); // c
        query = query.bind(event_start); // d
        query = query.bind(event_end); // e
        query = query.bind(workspace); // f
        query = query.bind(event_start); // g
        query = query.bind(event_end); // h
        query = query.bind(workspace); // i
        query = query.bind(uuid); // j
    }
    query = query.bind(filter.limit);

    let rows = query.fetch_all(store.pool()).await.map_err(StoreError::Transient)?;

    rows.iter().map(|r| row_to_event_with_sku(r).map_err(Into::into)).collect()
}

fn bucket_bounds(agg: Aggregation, event_start: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    match agg {
        Aggregation::Day => {
            let start = Utc
                .with_ymd_and_hms(event_start.year(), event_start.month(), event_start.day(), 0, 0, 0)
                .single()
                .expect("valid UTC day start");
            (start, start + Duration::days(1))
        }
        Aggregation::Month => {
            let (y, m) = (event_start.year(), event_start.month());
            let start = Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single().expect("valid UTC month start");
            let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
            let end = Utc.with_ymd_and_hms(ny, nm, 1, 0, 0, 0).single().expect("valid UTC month start");
            (start, end)
        }
        Aggregation::None => (event_start, event_start),
    }
}

/// Aggregation is implemented as an in-memory fold over the ordered plain
/// query result rather than a grouped SQL query: it keeps the bucket
/// boundary logic (UTC day/month, never crossing midnight) in one place
/// alongside the pagination predicate it shares with the unaggregated path.
/// The raw scan is paged to exhaustion before folding — the aggregated
/// result must reflect every matching row, not just the first chunk of
/// them, so `filter.limit` only bounds the *bucket* page returned, never
/// the underlying scan.
async fn find_events_aggregated(
    store: &Store,
    filter: &EventQueryFilter,
    agg: Aggregation,
) -> QueryResult<Vec<BillingEventWithSku>> {
    let mut scan_filter = filter.clone();
    scan_filter.aggregation = None;
    scan_filter.after = None;
    scan_filter.limit = DEFAULT_INTERNAL_LIMIT;

    use std::collections::BTreeMap;

    // Grouping key is (workspace, item, user, bucket) per §4.6: two events
    // sharing a workspace/item/bucket but differing in `user` (e.g. a
    // user-attributed discrete event alongside a userless estimator event)
    // must land in separate buckets, not be summed together.
    let mut buckets: BTreeMap<(DateTime<Utc>, String, Uuid, Option<Uuid>, String), (DateTime<Utc>, f64, Uuid)> =
        BTreeMap::new();

    loop {
        let page = find_events_plain(store, &scan_filter).await?;
        let page_len = page.len() as i64;
        if page.is_empty() {
            break;
        }

        for ev in &page {
            let (bucket_start, bucket_end) = bucket_bounds(agg, ev.event.event_start);
            let key = (
                bucket_start,
                ev.event.workspace.clone(),
                ev.event.item_id,
                ev.event.user,
                ev.sku.clone(),
            );

            let entry = buckets.entry(key).or_insert((bucket_end, 0.0, ev.event.uuid));
            entry.1 += ev.event.quantity;
            if ev.event.uuid < entry.2 {
                entry.2 = ev.event.uuid;
            }
        }

        scan_filter.after = Some(page.last().expect("checked non-empty above").event.uuid);

        if page_len < scan_filter.limit {
            break;
        }
    }

    let mut result: Vec<BillingEventWithSku> = buckets
        .into_iter()
        .map(|((bucket_start, workspace, item_id, user, sku), (bucket_end, quantity, uuid))| {
            BillingEventWithSku {
                event: crate::models::BillingEvent {
                    uuid,
                    event_start: bucket_start,
                    event_end: bucket_end,
                    item_id,
                    workspace,
                    user,
                    quantity,
                },
                sku,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        (a.event.event_start, a.event.event_end, &a.event.workspace, a.event.uuid).cmp(&(
            b.event.event_start,
            b.event.event_end,
            &b.event.workspace,
            b.event.uuid,
        ))
    });

    if let Some(after) = filter.after {
        if let Some(pos) = result.iter().position(|e| e.event.uuid == after) {
            result = result.split_off(pos + 1);
        }
    }

    result.truncate(filter.limit.max(0) as usize);

    Ok(result)
}
