//! The five HTTP routes (§4.8, §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use usageledger_core::time::deserialize_opt_utc_timestamp;
use usageledger_security::{account_authz, decode_bearer_token, workspace_authz};
use usageledger_store::{
    Aggregation as StoreAggregation, CatalogueRepository, EventQueryFilter, EventQueryRepository,
};

use crate::error::ApiError;
use crate::state::AppState;
use crate::views::{BillingEventView, BillingItemPriceView, BillingItemView};

const USAGE_DATA_VARY: &str = "Cookie,Authorization,Accept-Encoding";
const USAGE_DATA_CACHE_CONTROL: &str = "private,max-age=5";
const GLOBAL_VARY: &str = "Accept-Encoding";
const GLOBAL_CACHE_CONTROL: &str = "private,max-age=300";

fn with_headers(mut response: Response, vary: &str, cache_control: &str) -> Response {
    let headers = response.headers_mut();
    headers.insert(axum::http::header::VARY, HeaderValue::from_str(vary).unwrap());
    headers.insert(axum::http::header::CACHE_CONTROL, HeaderValue::from_str(cache_control).unwrap());
    response
}

fn usage_data_headers(response: Response) -> Response {
    with_headers(response, USAGE_DATA_VARY, USAGE_DATA_CACHE_CONTROL)
}

fn global_data_headers(response: Response) -> Response {
    with_headers(response, GLOBAL_VARY, GLOBAL_CACHE_CONTROL)
}

fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

#[derive(Debug, Deserialize)]
pub struct UsageDataQuery {
    #[serde(default, deserialize_with = "deserialize_opt_utc_timestamp")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_opt_utc_timestamp")]
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub after: Option<Uuid>,
    pub time_aggregation: Option<String>,
}

fn parse_aggregation(raw: Option<&str>) -> Option<StoreAggregation> {
    match raw {
        Some("day") => Some(StoreAggregation::Day),
        Some("month") => Some(StoreAggregation::Month),
        _ => None,
    }
}

async fn get_workspace_usage_data(
    State(state): State<AppState>,
    Path(workspace): Path<String>,
    headers: HeaderMap,
    Query(query): Query<UsageDataQuery>,
) -> Result<Response, ApiError> {
    let claims = decode_bearer_token(authorization_header(&headers))?;
    workspace_authz(&workspace, &claims, false, true)?;

    let filter = EventQueryFilter {
        workspace: Some(workspace),
        account: None,
        start: query.start,
        end: query.end,
        after: query.after,
        limit: query.limit.unwrap_or(usageledger_store::repositories::event_query::DEFAULT_HTTP_LIMIT),
        aggregation: parse_aggregation(query.time_aggregation.as_deref()),
    };

    let events = state.store.find_events(&filter).await?;
    let views: Vec<BillingEventView> = events.into_iter().map(Into::into).collect();

    Ok(usage_data_headers(Json(views).into_response()))
}

async fn get_account_usage_data(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<UsageDataQuery>,
) -> Result<Response, ApiError> {
    let claims = decode_bearer_token(authorization_header(&headers))?;
    account_authz(&account_id.to_string(), &claims, true)?;

    let filter = EventQueryFilter {
        workspace: None,
        account: Some(account_id),
        start: query.start,
        end: query.end,
        after: query.after,
        limit: query.limit.unwrap_or(usageledger_store::repositories::event_query::DEFAULT_HTTP_LIMIT),
        aggregation: None,
    };

    let events = state.store.find_events(&filter).await?;
    let views: Vec<BillingEventView> = events.into_iter().map(Into::into).collect();

    Ok(usage_data_headers(Json(views).into_response()))
}

async fn get_item_list(State(state): State<AppState>) -> Result<Response, ApiError> {
    let items = state.store.list_items().await?;
    let views: Vec<BillingItemView> = items.into_iter().map(Into::into).collect();
    Ok(global_data_headers(Json(views).into_response()))
}

async fn get_item(State(state): State<AppState>, Path(sku): Path<String>) -> Result<Response, ApiError> {
    let item = state.store.get_item(&sku).await?.ok_or(ApiError::SkuNotFound)?;
    Ok(global_data_headers(Json(BillingItemView::from(item)).into_response()))
}

async fn get_prices(State(state): State<AppState>) -> Result<Response, ApiError> {
    let prices = state.store.current_prices(Utc::now()).await?;
    let views: Vec<BillingItemPriceView> = prices.into_iter().map(Into::into).collect();
    Ok(global_data_headers(Json(views).into_response()))
}

pub fn router(store: Arc<usageledger_store::Store>) -> Router {
    Router::new()
        .route("/workspaces/{workspace}/accounting/usage-data", get(get_workspace_usage_data))
        .route("/accounts/{account_id}/accounting/usage-data", get(get_account_usage_data))
        .route("/accounting/skus", get(get_item_list))
        .route("/accounting/skus/{sku}", get(get_item))
        .route("/accounting/prices", get(get_prices))
        .with_state(AppState { store })
}
