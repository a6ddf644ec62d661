//! The three topic-bound message handlers (§4.7, §6). Each decodes its own
//! payload shape and processes it against the Store; missing-SKU recovery
//! already lives inside the repository methods this calls, so a handler
//! never retries anything itself.

use std::sync::Arc;

use async_trait::async_trait;

use usageledger_core::error::{IngestError, IngestResult};
use usageledger_store::{
    ingest_sample, EventRecorderRepository, RateSamplerRepository, Store, WorkspaceMapRepository,
};
use usageledger_store::messages::{
    BillingEventMessage, ConsumptionRateSampleMessage, WorkspaceSettingsMessage,
};

/// A single topic's message handler: decode a raw payload and process it
/// against the store. Implementations never retry on their own account
/// beyond what their store methods already do.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> IngestResult<()>;
}

fn decode<T: serde::de::DeserializeOwned>(payload: &[u8]) -> IngestResult<T> {
    serde_json::from_slice(payload).map_err(|e| IngestError::Validation(e.to_string()))
}

pub struct BillingEventHandler {
    store: Arc<Store>,
}

impl BillingEventHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageHandler for BillingEventHandler {
    async fn handle(&self, payload: &[u8]) -> IngestResult<()> {
        let msg: BillingEventMessage = decode(payload)?;
        self.store.insert_event(&msg).await?;
        Ok(())
    }
}

pub struct WorkspaceSettingsHandler {
    store: Arc<Store>,
}

impl WorkspaceSettingsHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageHandler for WorkspaceSettingsHandler {
    async fn handle(&self, payload: &[u8]) -> IngestResult<()> {
        let msg: WorkspaceSettingsMessage = decode(payload)?;

        let recorded = self.store.record_mapping(msg.account, &msg.name).await?;
        if recorded {
            tracing::info!(workspace = %msg.name, account = %msg.account, "associated workspace with account");
        } else {
            tracing::debug!(workspace = %msg.name, "ignoring workspace-settings, already known");
        }

        Ok(())
    }
}

pub struct ConsumptionRateSampleHandler {
    store: Arc<Store>,
}

impl ConsumptionRateSampleHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageHandler for ConsumptionRateSampleHandler {
    async fn handle(&self, payload: &[u8]) -> IngestResult<()> {
        let msg: ConsumptionRateSampleMessage = decode(payload)?;
        ingest_sample(&self.store, &msg).await
    }
}
