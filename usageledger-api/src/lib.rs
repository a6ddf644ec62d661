//! ReadAPI (C9): the HTTP surface over Catalogue, WorkspaceMap and
//! EventQuery.

pub mod error;
pub mod routes;
pub mod state;
pub mod views;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use usageledger_store::Store;

/// Build the full application router, mounted under `root_path`.
///
/// `root_path` is normalised to strip any trailing slash: axum's `nest`
/// rejects mount points that end in one, but `ROOT_PATH` defaults to
/// `/api/` per §4.0.
pub fn app(store: Arc<Store>, root_path: &str) -> Router {
    let mount = root_path.trim_end_matches('/');
    let mount = if mount.is_empty() { "/" } else { mount };
    Router::new().nest(mount, routes::router(store)).layer(TraceLayer::new_for_http())
}
