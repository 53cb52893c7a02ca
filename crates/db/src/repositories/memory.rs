use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use propmatch_core::context::ContextStore;
use propmatch_core::domain::context::{ConversationContext, ConversationId};
use propmatch_core::errors::ContextStoreError;

/// Process-local context store. Expiry is checked lazily on read and swept by
/// `purge_expired`.
pub struct InMemoryContextStore {
    contexts: RwLock<HashMap<ConversationId, ConversationContext>>,
    ttl: Duration,
}

impl InMemoryContextStore {
    pub fn new(ttl: Duration) -> Self {
        Self { contexts: RwLock::new(HashMap::new()), ttl }
    }

    pub async fn load_at(
        &self,
        id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Option<ConversationContext> {
        let mut contexts = self.contexts.write().await;
        let entry = contexts.get_mut(id)?;
        if entry.is_expired(self.ttl, now) {
            contexts.remove(id);
            debug!(event_name = "context_store.memory.expired", conversation_id = %id, "expired context dropped");
            return None;
        }
        entry.last_access_time = now;
        Some(entry.clone())
    }

    pub async fn save_at(&self, context: &ConversationContext, now: DateTime<Utc>) {
        let mut stored = context.clone();
        stored.last_access_time = now;
        self.contexts.write().await.insert(stored.conversation_id.clone(), stored);
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut contexts = self.contexts.write().await;
        let before = contexts.len();
        contexts.retain(|_, context| !context.is_expired(self.ttl, now));
        let purged = before.saturating_sub(contexts.len());
        if purged > 0 {
            debug!(event_name = "context_store.memory.purged", purged, "purged expired contexts");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }

    pub(crate) async fn evict(&self, id: &ConversationId) {
        self.contexts.write().await.remove(id);
    }
}

#[async_trait::async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, ContextStoreError> {
        Ok(self.load_at(id, Utc::now()).await)
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), ContextStoreError> {
        self.save_at(context, Utc::now()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use propmatch_core::domain::context::{ConversationContext, ConversationId};

    use super::InMemoryContextStore;

    fn conversation(id: &str) -> ConversationId {
        ConversationId::parse(id).expect("valid conversation id")
    }

    #[tokio::test]
    async fn load_slides_ttl_and_expired_entries_vanish() {
        let store = InMemoryContextStore::new(Duration::minutes(30));
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single().expect("timestamp");
        store.save_at(&ConversationContext::started_at(conversation("conv-a"), start), start).await;

        assert!(store.load_at(&conversation("conv-a"), start + Duration::minutes(29)).await.is_some());
        assert!(store.load_at(&conversation("conv-a"), start + Duration::minutes(58)).await.is_some());
        assert!(store.load_at(&conversation("conv-a"), start + Duration::minutes(90)).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn purge_only_removes_idle_entries() {
        let store = InMemoryContextStore::new(Duration::minutes(30));
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single().expect("timestamp");
        store.save_at(&ConversationContext::started_at(conversation("idle"), start), start).await;
        store
            .save_at(
                &ConversationContext::started_at(conversation("busy"), start),
                start + Duration::minutes(20),
            )
            .await;

        assert_eq!(store.purge_expired(start + Duration::minutes(35)).await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.load_at(&conversation("busy"), start + Duration::minutes(35)).await.is_some());
    }

    #[tokio::test]
    async fn unknown_ids_load_as_absent() {
        let store = InMemoryContextStore::new(Duration::minutes(30));
        let now = Utc::now();
        store.save_at(&ConversationContext::started_at(conversation("conv-a"), now), now).await;
        assert!(store.load_at(&conversation("conv-b"), now).await.is_none());
    }
}
