//! Message-bus ingestion: per-topic handlers and the dispatcher that routes
//! and classifies their outcomes.

pub mod dispatcher;
pub mod handlers;

pub use dispatcher::{
    IngestDispatcher, Outcome, TOPIC_BILLING_EVENTS, TOPIC_CONSUMPTION_RATE_SAMPLES,
    TOPIC_WORKSPACE_SETTINGS,
};
pub use handlers::{BillingEventHandler, ConsumptionRateSampleHandler, MessageHandler, WorkspaceSettingsHandler};

/// Build the standard dispatcher wiring the three known topics to their
/// handlers against `store`.
pub fn default_dispatcher(store: std::sync::Arc<usageledger_store::Store>) -> IngestDispatcher {
    IngestDispatcher::new()
        .with_handler(TOPIC_BILLING_EVENTS, std::sync::Arc::new(BillingEventHandler::new(store.clone())))
        .with_handler(
            TOPIC_WORKSPACE_SETTINGS,
            std::sync::Arc::new(WorkspaceSettingsHandler::new(store.clone())),
        )
        .with_handler(
            TOPIC_CONSUMPTION_RATE_SAMPLES,
            std::sync::Arc::new(ConsumptionRateSampleHandler::new(store)),
        )
}
