use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use crate::error::BookingResult;

/// Where a conversation stands in the booking flow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStage {
    Idle,
    CinemaChosen,
    MovieChosen,
    SessionChosen,
    SeatPending,
    /// Reported once in the confirmation reply; the state is cleared right after
    Confirmed,
}

/// A seat tentatively chosen but not yet committed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingSeat {
    pub seat_id: i64,
    pub row: i32,
    pub number: i32,
}

/// Per-conversation selection state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub cinema_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub session_id: Option<i64>,
    pub pending_seat: Option<PendingSeat>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            cinema_id: None,
            movie_id: None,
            session_id: None,
            pending_seat: None,
            updated_at: Utc::now(),
        }
    }

    pub fn stage(&self) -> BookingStage {
        if self.pending_seat.is_some() {
            BookingStage::SeatPending
        } else if self.session_id.is_some() {
            BookingStage::SessionChosen
        } else if self.movie_id.is_some() {
            BookingStage::MovieChosen
        } else if self.cinema_id.is_some() {
            BookingStage::CinemaChosen
        } else {
            BookingStage::Idle
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage for conversation state, keyed by the opaque conversation id
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, conversation_id: &str) -> BookingResult<Option<ConversationState>>;

    async fn save(&self, conversation_id: &str, state: &ConversationState) -> BookingResult<()>;

    async fn remove(&self, conversation_id: &str) -> BookingResult<()>;

    /// Drop every conversation last touched before `cutoff`; returns how many went
    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> BookingResult<usize>;
}

/// Process-local conversation storage
pub struct InMemoryConversationStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, conversation_id: &str) -> BookingResult<Option<ConversationState>> {
        Ok(self.states.read().await.get(conversation_id).cloned())
    }

    async fn save(&self, conversation_id: &str, state: &ConversationState) -> BookingResult<()> {
        self.states
            .write()
            .await
            .insert(conversation_id.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, conversation_id: &str) -> BookingResult<()> {
        self.states.write().await.remove(conversation_id);
        Ok(())
    }

    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> BookingResult<usize> {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, state| state.updated_at >= cutoff);
        Ok(before - states.len())
    }
}
