use async_trait::async_trait;

use crate::domain::context::{ConversationContext, ConversationId};
use crate::errors::ContextStoreError;

/// Backing store for per-conversation context. `load` refreshes the entry's
/// TTL; an absent or expired entry loads as `None`. There is no delete: idle
/// entries age out.
#[async_trait]
pub trait ContextStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, ContextStoreError>;

    async fn save(&self, context: &ConversationContext) -> Result<(), ContextStoreError>;
}
