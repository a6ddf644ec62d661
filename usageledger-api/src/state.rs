use std::sync::Arc;

use usageledger_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}
