use std::sync::Arc;
use chrono::Duration;
use cinemastar_booking::{
    ConversationStore, ConversationTracker, DialogueController, InMemoryConversationStore,
    ReservationEngine,
};
use cinemastar_catalog::{CatalogError, CatalogSeed, CatalogStore, InMemoryCatalog};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub tracker: Arc<ConversationTracker>,
    pub engine: Arc<ReservationEngine>,
    pub dialogue: Arc<DialogueController>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        conversations: Arc<dyn ConversationStore>,
        idle_ttl: Duration,
    ) -> Self {
        let tracker = Arc::new(ConversationTracker::new(conversations).with_idle_ttl(idle_ttl));
        let engine = Arc::new(ReservationEngine::new(catalog.clone(), tracker.clone()));
        let dialogue = Arc::new(DialogueController::new(
            catalog.clone(),
            tracker.clone(),
            engine.clone(),
        ));

        Self { catalog, tracker, engine, dialogue }
    }

    /// Everything in process memory; used by the `memory` backends and tests
    pub fn in_memory(seed: CatalogSeed, idle_ttl: Duration) -> Result<Self, CatalogError> {
        let catalog = Arc::new(InMemoryCatalog::from_seed(seed)?);
        Ok(Self::new(catalog, Arc::new(InMemoryConversationStore::new()), idle_ttl))
    }
}
