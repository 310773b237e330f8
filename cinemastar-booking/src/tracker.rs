use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::{debug, info};
use crate::conversation::{ConversationState, ConversationStore, PendingSeat};
use crate::error::{BookingError, BookingResult};

/// Owns every conversation's selection state.
///
/// Setters overwrite one field and discard the selections downstream of it.
/// They do not check that ids resolve in the catalog; the dialogue only
/// offers valid choices and the reservation engine re-validates on commit.
pub struct ConversationTracker {
    store: Arc<dyn ConversationStore>,
    idle_ttl: Option<Duration>,
}

impl ConversationTracker {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store, idle_ttl: None }
    }

    /// Conversations idle for longer than `ttl` behave as if never started
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Create or reset a conversation to an empty state
    pub async fn start(&self, conversation_id: &str) -> BookingResult<ConversationState> {
        let state = ConversationState::new();
        self.store.save(conversation_id, &state).await?;
        info!("Conversation {} started", conversation_id);
        Ok(state)
    }

    pub async fn get(&self, conversation_id: &str) -> BookingResult<ConversationState> {
        let state = self
            .store
            .load(conversation_id)
            .await?
            .ok_or_else(|| BookingError::UnknownConversation(conversation_id.to_string()))?;

        if let Some(ttl) = self.idle_ttl {
            if state.updated_at + ttl < Utc::now() {
                debug!(
                    "Conversation {} expired after {}s idle",
                    conversation_id,
                    ttl.num_seconds()
                );
                self.store.remove(conversation_id).await?;
                return Err(BookingError::UnknownConversation(conversation_id.to_string()));
            }
        }

        Ok(state)
    }

    pub async fn set_cinema(
        &self,
        conversation_id: &str,
        cinema_id: i64,
    ) -> BookingResult<ConversationState> {
        self.update(conversation_id, |state| {
            state.cinema_id = Some(cinema_id);
            state.movie_id = None;
            state.session_id = None;
            state.pending_seat = None;
        })
        .await
    }

    pub async fn set_movie(
        &self,
        conversation_id: &str,
        movie_id: i64,
    ) -> BookingResult<ConversationState> {
        self.update(conversation_id, |state| {
            state.movie_id = Some(movie_id);
            state.session_id = None;
            state.pending_seat = None;
        })
        .await
    }

    pub async fn set_session(
        &self,
        conversation_id: &str,
        session_id: i64,
    ) -> BookingResult<ConversationState> {
        self.update(conversation_id, |state| {
            state.session_id = Some(session_id);
            state.pending_seat = None;
        })
        .await
    }

    pub async fn set_pending_seat(
        &self,
        conversation_id: &str,
        seat: PendingSeat,
    ) -> BookingResult<ConversationState> {
        self.update(conversation_id, |state| state.pending_seat = Some(seat)).await
    }

    pub async fn clear_pending_seat(
        &self,
        conversation_id: &str,
    ) -> BookingResult<ConversationState> {
        self.update(conversation_id, |state| state.pending_seat = None).await
    }

    /// Forget the conversation entirely
    pub async fn clear(&self, conversation_id: &str) -> BookingResult<()> {
        self.store.remove(conversation_id).await?;
        debug!("Conversation {} cleared", conversation_id);
        Ok(())
    }

    /// Drop conversations idle for longer than the configured TTL
    pub async fn evict_idle(&self) -> BookingResult<usize> {
        match self.idle_ttl {
            Some(ttl) => self.store.evict_idle(Utc::now() - ttl).await,
            None => Ok(0),
        }
    }

    async fn update<F>(&self, conversation_id: &str, apply: F) -> BookingResult<ConversationState>
    where
        F: FnOnce(&mut ConversationState),
    {
        let mut state = self.get(conversation_id).await?;
        apply(&mut state);
        state.touch();
        self.store.save(conversation_id, &state).await?;
        Ok(state)
    }
}
