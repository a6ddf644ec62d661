//! IngestDispatcher (C8): routes a message to its topic's handler and
//! classifies the outcome for the bus client to act on.

use std::collections::HashMap;
use std::sync::Arc;

use usageledger_core::error::{ErrorClass, IngestError};

use crate::handlers::MessageHandler;

pub const TOPIC_BILLING_EVENTS: &str = "billing-events";
pub const TOPIC_WORKSPACE_SETTINGS: &str = "workspace-settings";
pub const TOPIC_CONSUMPTION_RATE_SAMPLES: &str = "billing-events-consumption-rate-samples";

/// What the bus client should do with a message after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Acknowledge: the message was processed (or was a harmless duplicate).
    Ack,
    /// Acknowledge: retrying would not help.
    AckPermanentFailure,
    /// Do not acknowledge: ask for redelivery.
    Nack,
}

pub struct IngestDispatcher {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl IngestDispatcher {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn with_handler(mut self, topic: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(topic.into(), handler);
        self
    }

    /// Route `payload` to the handler registered for `topic`. An unknown
    /// topic is itself a permanent failure: there is nothing useful to
    /// retry into.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> Outcome {
        let Some(handler) = self.handlers.get(topic) else {
            tracing::warn!(topic, "no handler registered for topic");
            return Outcome::AckPermanentFailure;
        };

        match handler.handle(payload).await {
            Ok(()) => Outcome::Ack,
            Err(e) => {
                let class = e.classify();
                log_failure(topic, &e, class);
                match class {
                    ErrorClass::Permanent => Outcome::AckPermanentFailure,
                    ErrorClass::Transient => Outcome::Nack,
                }
            }
        }
    }
}

impl Default for IngestDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn log_failure(topic: &str, error: &IngestError, class: ErrorClass) {
    match class {
        ErrorClass::Permanent => tracing::warn!(topic, %error, "dropping message, permanent failure"),
        ErrorClass::Transient => tracing::warn!(topic, %error, "requesting redelivery, transient failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use usageledger_core::error::IngestResult;

    struct AlwaysOk;
    #[async_trait]
    impl MessageHandler for AlwaysOk {
        async fn handle(&self, _payload: &[u8]) -> IngestResult<()> {
            Ok(())
        }
    }

    struct AlwaysInvalid;
    #[async_trait]
    impl MessageHandler for AlwaysInvalid {
        async fn handle(&self, _payload: &[u8]) -> IngestResult<()> {
            Err(IngestError::Validation("bad uuid".into()))
        }
    }

    #[tokio::test]
    async fn unknown_topic_is_a_permanent_failure() {
        let dispatcher = IngestDispatcher::new();
        assert_eq!(dispatcher.dispatch("nonsense", b"{}").await, Outcome::AckPermanentFailure);
    }

    #[tokio::test]
    async fn successful_handler_acks() {
        let dispatcher = IngestDispatcher::new().with_handler("t", Arc::new(AlwaysOk));
        assert_eq!(dispatcher.dispatch("t", b"{}").await, Outcome::Ack);
    }

    #[tokio::test]
    async fn validation_failure_acks_without_redelivery() {
        let dispatcher = IngestDispatcher::new().with_handler("t", Arc::new(AlwaysInvalid));
        assert_eq!(dispatcher.dispatch("t", b"{}").await, Outcome::AckPermanentFailure);
    }
}
