//! Integration tests against a real Postgres instance. Each test connects
//! the same way production does (`Store::connect` + `migrate`) against
//! `DATABASE_URL`, so they are `#[ignore]`d by default and only run when a
//! database is actually available, e.g.:
//!
//! ```sh
//! DATABASE_URL=postgres://... cargo test -p usageledger-store -- --ignored
//! ```

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use usageledger_core::config::DatabaseConfig;
use usageledger_store::{
    ingest_sample, BillingEventMessage, CatalogueRepository, ConsumptionRateSampleMessage,
    EstimatorRepository, EventQueryFilter, EventQueryRepository, EventRecorderRepository,
    RateSamplerRepository, Store, WorkspaceMapRepository,
};

async fn connect() -> Store {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run the ignored integration tests");
    let store = Store::connect(&DatabaseConfig { url, max_connections: 5 })
        .await
        .expect("failed to connect to Postgres");
    store.migrate().await.expect("failed to apply migrations");
    store
}

fn unique_workspace(tag: &str) -> String {
    format!("ws-{tag}-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn duplicate_event_uuid_is_inserted_once() {
    let store = connect().await;
    store.upsert_item("dup-sku", Some("Duplicate test SKU"), Some("seconds")).await.unwrap();

    let msg = BillingEventMessage {
        uuid: Uuid::new_v4(),
        event_start: Utc::now(),
        event_end: Utc::now() + Duration::hours(1),
        sku: "dup-sku".to_string(),
        workspace: unique_workspace("dup"),
        user: None,
        quantity: 42.0,
    };

    let first = store.insert_event(&msg).await.unwrap();
    assert_eq!(first, Some(msg.uuid));

    let second = store.insert_event(&msg).await.unwrap();
    assert_eq!(second, None, "second insert of the same uuid must be a no-op");
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn price_timeline_has_at_most_one_open_price_and_is_contiguous() {
    let store = connect().await;
    let sku = format!("timeline-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Timeline test SKU"), Some("seconds")).await.unwrap();

    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

    store.upsert_price(&sku, t0, Decimal::new(1, 2)).await.unwrap();
    store.upsert_price(&sku, t1, Decimal::new(2, 2)).await.unwrap();
    store.upsert_price(&sku, t2, Decimal::new(3, 2)).await.unwrap();

    let prices = store.current_prices(t2 + Duration::days(1)).await.unwrap();
    let mut ours: Vec<_> = prices.into_iter().filter(|(_, s)| s == &sku).collect();
    ours.sort_by_key(|(p, _)| p.valid_from);

    assert_eq!(ours.len(), 1, "only the most recent price is open-ended");
    assert_eq!(ours[0].0.valid_from, t2);
    assert_eq!(ours[0].0.valid_until, None);

    let open_count =
        ours.iter().filter(|(p, _)| p.valid_until.is_none()).count();
    assert_eq!(open_count, 1);
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn out_of_order_price_is_rejected() {
    let store = connect().await;
    let sku = format!("order-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Ordering test SKU"), Some("seconds")).await.unwrap();

    let later = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    store.upsert_price(&sku, later, Decimal::new(5, 2)).await.unwrap();
    let err = store.upsert_price(&sku, earlier, Decimal::new(1, 2)).await.unwrap_err();

    assert!(matches!(
        err,
        usageledger_core::error::CatalogueError::PriceOutOfOrder { .. }
    ));
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn pagination_visits_every_row_exactly_once_in_total_order() {
    let store = connect().await;
    let sku = format!("page-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Pagination test SKU"), Some("seconds")).await.unwrap();
    let workspace = unique_workspace("page");

    let base = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
    let total = 23;
    for i in 0..total {
        let msg = BillingEventMessage {
            uuid: Uuid::new_v4(),
            event_start: base + Duration::hours(i),
            event_end: base + Duration::hours(i + 1),
            sku: sku.clone(),
            workspace: workspace.clone(),
            user: None,
            quantity: i as f64,
        };
        store.insert_event(&msg).await.unwrap();
    }

    let page_size = 7;
    let mut seen = std::collections::HashSet::new();
    let mut after = None;

    loop {
        let filter = EventQueryFilter {
            workspace: Some(workspace.clone()),
            after,
            limit: page_size,
            ..EventQueryFilter::internal_default()
        };
        let page = store.find_events(&filter).await.unwrap();
        if page.is_empty() {
            break;
        }

        for ev in &page {
            assert!(seen.insert(ev.event.uuid), "row {} visited twice", ev.event.uuid);
        }

        after = Some(page.last().unwrap().event.uuid);
    }

    assert_eq!(seen.len(), total as usize);
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn estimator_generate_upto_is_idempotent() {
    let store = connect().await;
    let sku = format!("estimate-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Estimator test SKU"), Some("seconds")).await.unwrap();
    let workspace = unique_workspace("estimate");

    let base = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
    for (offset_minutes, rate) in [(0, 1.0), (30, 2.0), (90, 3.0)] {
        let msg = ConsumptionRateSampleMessage {
            uuid: Uuid::new_v4(),
            sample_time: base + Duration::minutes(offset_minutes),
            sku: sku.clone(),
            workspace: workspace.clone(),
            user: None,
            rate,
        };
        ingest_sample(&store, &msg).await.unwrap();
    }

    let upto = base + Duration::hours(2);
    store.generate_upto(&workspace, &sku, upto).await.unwrap();

    let filter = EventQueryFilter {
        workspace: Some(workspace.clone()),
        ..EventQueryFilter::internal_default()
    };
    let first_pass = store.find_events(&filter).await.unwrap();

    store.generate_upto(&workspace, &sku, upto).await.unwrap();
    let second_pass = store.find_events(&filter).await.unwrap();

    assert_eq!(first_pass.len(), second_pass.len());
    let first_uuids: std::collections::HashSet<_> =
        first_pass.iter().map(|e| e.event.uuid).collect();
    let second_uuids: std::collections::HashSet<_> =
        second_pass.iter().map(|e| e.event.uuid).collect();
    assert_eq!(first_uuids, second_uuids);
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn workspace_account_mapping_never_moves() {
    let store = connect().await;
    let workspace = unique_workspace("map");
    let first_account = Uuid::new_v4();
    let second_account = Uuid::new_v4();

    let inserted_first = store.record_mapping(first_account, &workspace).await.unwrap();
    assert!(inserted_first);

    let inserted_second = store.record_mapping(second_account, &workspace).await.unwrap();
    assert!(!inserted_second, "a later message must not move the workspace to a new account");

    let resolved = store.account_for_workspace(&workspace).await.unwrap();
    assert_eq!(resolved, Some(first_account));
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn account_usage_data_only_returns_events_for_owned_workspaces() {
    let store = connect().await;
    let sku = format!("acct-filter-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Account filter test SKU"), Some("seconds")).await.unwrap();

    let account = Uuid::new_v4();
    let ws1 = unique_workspace("acct-1");
    let ws2 = unique_workspace("acct-2");
    let ws3 = unique_workspace("acct-3");

    store.record_mapping(account, &ws1).await.unwrap();
    store.record_mapping(account, &ws3).await.unwrap();
    store.record_mapping(Uuid::new_v4(), &ws2).await.unwrap();

    let base = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
    for (i, workspace) in [&ws1, &ws2, &ws3].into_iter().enumerate() {
        let msg = BillingEventMessage {
            uuid: Uuid::new_v4(),
            event_start: base + Duration::hours(i as i64),
            event_end: base + Duration::hours(i as i64 + 1),
            sku: sku.clone(),
            workspace: workspace.clone(),
            user: None,
            quantity: 1.0,
        };
        store.insert_event(&msg).await.unwrap();
    }

    let filter = EventQueryFilter { account: Some(account), ..EventQueryFilter::internal_default() };
    let events = store.find_events(&filter).await.unwrap();

    let workspaces: Vec<&str> = events.iter().map(|e| e.event.workspace.as_str()).collect();
    assert_eq!(workspaces, vec![ws1.as_str(), ws3.as_str()]);
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn day_aggregation_sums_quantities_within_each_utc_day() {
    use usageledger_store::Aggregation;

    let store = connect().await;
    let sku = format!("day-agg-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Day aggregation test SKU"), Some("seconds")).await.unwrap();
    let workspace = unique_workspace("day-agg");

    let day1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

    let windows = [
        (day1, day1 + Duration::hours(1), 0.01),
        (day1 + Duration::hours(2), day1 + Duration::hours(3), 0.10),
        (day1 + Duration::hours(23), day2 + Duration::hours(1), 1.00),
        (day2 + Duration::hours(2), day2 + Duration::hours(3), 0.20),
    ];

    for (start, end, quantity) in windows {
        let msg = BillingEventMessage {
            uuid: Uuid::new_v4(),
            event_start: start,
            event_end: end,
            sku: sku.clone(),
            workspace: workspace.clone(),
            user: None,
            quantity,
        };
        store.insert_event(&msg).await.unwrap();
    }

    let filter = EventQueryFilter {
        workspace: Some(workspace.clone()),
        aggregation: Some(Aggregation::Day),
        ..EventQueryFilter::internal_default()
    };
    let buckets = store.find_events(&filter).await.unwrap();

    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].event.event_start, day1);
    assert!((buckets[0].event.quantity - 1.11).abs() < 1e-9, "got {}", buckets[0].event.quantity);
    assert_eq!(buckets[1].event.event_start, day2);
    assert!((buckets[1].event.quantity - 0.20).abs() < 1e-9, "got {}", buckets[1].event.quantity);
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn aggregation_keeps_different_users_in_separate_buckets() {
    use usageledger_store::Aggregation;

    let store = connect().await;
    let sku = format!("user-split-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("User split test SKU"), Some("seconds")).await.unwrap();
    let workspace = unique_workspace("user-split");

    let day = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let user = Uuid::new_v4();

    // One user-attributed discrete event and one userless estimator event,
    // same workspace/item/day: these must never be summed into one bucket.
    let attributed = BillingEventMessage {
        uuid: Uuid::new_v4(),
        event_start: day,
        event_end: day + Duration::hours(1),
        sku: sku.clone(),
        workspace: workspace.clone(),
        user: Some(user),
        quantity: 3.0,
    };
    let unattributed = BillingEventMessage {
        uuid: Uuid::new_v4(),
        event_start: day + Duration::hours(2),
        event_end: day + Duration::hours(3),
        sku: sku.clone(),
        workspace: workspace.clone(),
        user: None,
        quantity: 5.0,
    };
    store.insert_event(&attributed).await.unwrap();
    store.insert_event(&unattributed).await.unwrap();

    let filter = EventQueryFilter {
        workspace: Some(workspace.clone()),
        aggregation: Some(Aggregation::Day),
        ..EventQueryFilter::internal_default()
    };
    let buckets = store.find_events(&filter).await.unwrap();

    assert_eq!(buckets.len(), 2, "distinct users must not be merged into one bucket");
    let quantities: std::collections::BTreeMap<Option<Uuid>, f64> =
        buckets.iter().map(|b| (b.event.user, b.event.quantity)).collect();
    assert_eq!(quantities.get(&Some(user)), Some(&3.0));
    assert_eq!(quantities.get(&None), Some(&5.0));
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn aggregation_scans_past_the_internal_page_size() {
    use usageledger_store::Aggregation;

    let store = connect().await;
    let sku = format!("deep-scan-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Deep scan test SKU"), Some("seconds")).await.unwrap();
    let workspace = unique_workspace("deep-scan");

    // More rows than a single internal page, all in the same day bucket, at
    // distinct event_start offsets so none of them collide on insert.
    let day = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
    let page = EventQueryFilter::internal_default().limit;
    let total = page + 50;

    for i in 0..total {
        let offset = Duration::seconds(i);
        let msg = BillingEventMessage {
            uuid: Uuid::new_v4(),
            event_start: day + offset,
            event_end: day + offset + Duration::seconds(1),
            sku: sku.clone(),
            workspace: workspace.clone(),
            user: None,
            quantity: 1.0,
        };
        store.insert_event(&msg).await.unwrap();
    }

    let filter = EventQueryFilter {
        workspace: Some(workspace.clone()),
        aggregation: Some(Aggregation::Day),
        ..EventQueryFilter::internal_default()
    };
    let buckets = store.find_events(&filter).await.unwrap();

    assert_eq!(buckets.len(), 1);
    assert!(
        (buckets[0].event.quantity - total as f64).abs() < 1e-9,
        "expected every one of {total} rows to be folded into the single bucket, got {}",
        buckets[0].event.quantity
    );
}

#[tokio::test]
#[ignore] // requires a real Postgres connection (DATABASE_URL)
async fn price_upsert_at_same_valid_from_updates_in_place() {
    let store = connect().await;
    let sku = format!("price-update-{}", Uuid::new_v4());
    store.upsert_item(&sku, Some("Price update test SKU"), Some("seconds")).await.unwrap();

    let valid_from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    store.upsert_price(&sku, valid_from, Decimal::new(1234, 2)).await.unwrap();
    store.upsert_price(&sku, valid_from, Decimal::new(1235, 2)).await.unwrap();

    let current = store.current_prices(valid_from).await.unwrap();
    let (ours, _) = current.into_iter().find(|(_, s)| s == &sku).unwrap();
    assert_eq!(ours.valid_from, valid_from);
    assert_eq!(ours.price, Decimal::new(1235, 2));
    assert_eq!(ours.valid_until, None);

    let next_from = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
    store.upsert_price(&sku, next_from, Decimal::new(1100, 2)).await.unwrap();

    let still_open = store.current_prices(next_from).await.unwrap();
    let (new_current, _) = still_open.into_iter().find(|(_, s)| s == &sku).unwrap();
    assert_eq!(new_current.valid_from, next_from);
    assert_eq!(new_current.price, Decimal::new(1100, 2));
    assert_eq!(new_current.valid_until, None);

    let old_window = store.current_prices(valid_from).await.unwrap();
    let (closed, _) = old_window.into_iter().find(|(_, s)| s == &sku).unwrap();
    assert_eq!(closed.valid_until, Some(next_from));
}
