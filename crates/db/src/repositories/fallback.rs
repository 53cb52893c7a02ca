//! Context store that never fails: primary errors degrade to a process-local store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use propmatch_core::context::ContextStore;
use propmatch_core::domain::context::{ConversationContext, ConversationId};
use propmatch_core::errors::ContextStoreError;

use super::InMemoryContextStore;

const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_secs(2);

/// Entries written to the fallback during an outage stay authoritative until
/// the primary accepts a save for the same conversation.
pub struct FallbackContextStore {
    primary: Arc<dyn ContextStore>,
    fallback: Arc<InMemoryContextStore>,
    primary_timeout: Duration,
}

impl FallbackContextStore {
    pub fn new(primary: Arc<dyn ContextStore>, fallback: Arc<InMemoryContextStore>) -> Self {
        Self { primary, fallback, primary_timeout: DEFAULT_PRIMARY_TIMEOUT }
    }

    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = timeout;
        self
    }

    pub fn fallback(&self) -> &Arc<InMemoryContextStore> {
        &self.fallback
    }

    async fn primary_load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, ContextStoreError> {
        tokio::time::timeout(self.primary_timeout, self.primary.load(id))
            .await
            .map_err(|_| self.timed_out())?
    }

    async fn primary_save(&self, context: &ConversationContext) -> Result<(), ContextStoreError> {
        tokio::time::timeout(self.primary_timeout, self.primary.save(context))
            .await
            .map_err(|_| self.timed_out())?
    }

    fn timed_out(&self) -> ContextStoreError {
        ContextStoreError::Unavailable(format!(
            "{} store timed out after {}ms",
            self.primary.name(),
            self.primary_timeout.as_millis()
        ))
    }
}

#[async_trait::async_trait]
impl ContextStore for FallbackContextStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, ContextStoreError> {
        if let Some(context) = self.fallback.load(id).await? {
            debug!(
                event_name = "context_store.fallback.served",
                conversation_id = %id,
                "serving context written during primary outage"
            );
            return Ok(Some(context));
        }

        match self.primary_load(id).await {
            Ok(context) => Ok(context),
            Err(error) => {
                warn!(
                    event_name = "context_store.unavailable",
                    operation = "load",
                    store = self.primary.name(),
                    conversation_id = %id,
                    error = %error,
                    "primary context store failed, starting from empty context"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), ContextStoreError> {
        match self.primary_save(context).await {
            Ok(()) => {
                self.fallback.evict(&context.conversation_id).await;
                Ok(())
            }
            Err(error) => {
                warn!(
                    event_name = "context_store.unavailable",
                    operation = "save",
                    store = self.primary.name(),
                    conversation_id = %context.conversation_id,
                    error = %error,
                    "primary context store failed, saving to fallback"
                );
                self.fallback.save(context).await
            }
        }
    }
}
