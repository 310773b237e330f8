use std::sync::Arc;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use cinemastar_catalog::{BookOutcome, CatalogStore};
use crate::conversation::PendingSeat;
use crate::error::{BookingError, BookingResult};
use crate::events::BookingEvent;
use crate::tracker::ConversationTracker;

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Everything the customer needs to find their seat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingSummary {
    pub seat_id: i64,
    pub session_id: i64,
    pub movie_title: String,
    pub cinema_name: String,
    pub cinema_address: String,
    pub date: NaiveDate,
    #[serde(with = "cinemastar_catalog::models::hhmm")]
    pub time: NaiveTime,
    pub row: i32,
    pub number: i32,
    pub booked_at: DateTime<Utc>,
}

/// Seat selection and booking.
///
/// Selecting a seat only records a candidate in the conversation. Confirming
/// re-reads the seat and commits through the catalog's compare-and-swap, so
/// at most one conversation can ever book a given seat.
pub struct ReservationEngine {
    catalog: Arc<dyn CatalogStore>,
    tracker: Arc<ConversationTracker>,
    events: broadcast::Sender<BookingEvent>,
}

impl ReservationEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>, tracker: Arc<ConversationTracker>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { catalog, tracker, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    /// SessionChosen | SeatPending -> SeatPending.
    ///
    /// Re-selecting while a candidate is pending replaces it. On error the
    /// conversation is left untouched.
    pub async fn choose_seat(
        &self,
        conversation_id: &str,
        row: i32,
        number: i32,
    ) -> BookingResult<PendingSeat> {
        let state = self.tracker.get(conversation_id).await?;
        let session_id = state.session_id.ok_or_else(|| {
            BookingError::InvalidSelection("choose a session before picking a seat".to_string())
        })?;

        let session = self.catalog.get_session(session_id).await?.ok_or_else(|| {
            BookingError::InvalidSelection(format!("session {} is no longer available", session_id))
        })?;

        if !session.contains(row, number) {
            return Err(BookingError::SeatNotFound { row, number });
        }

        let seat = self
            .catalog
            .find_seat(session_id, row, number)
            .await?
            .ok_or(BookingError::SeatNotFound { row, number })?;

        if seat.is_booked {
            return Err(BookingError::SeatAlreadyBooked { row, number });
        }

        let pending = PendingSeat { seat_id: seat.id, row, number };
        self.tracker.set_pending_seat(conversation_id, pending).await?;
        info!(
            "Conversation {} holds seat {} (row {}, number {})",
            conversation_id, seat.id, row, number
        );

        Ok(pending)
    }

    /// SeatPending -> Confirmed -> Idle.
    ///
    /// A rejection caused by the seat itself (gone, booked, race lost)
    /// discards the stale candidate and leaves the conversation in
    /// SessionChosen so a new seat can be picked.
    pub async fn confirm(&self, conversation_id: &str) -> BookingResult<BookingSummary> {
        let state = self.tracker.get(conversation_id).await?;
        let pending = state
            .pending_seat
            .ok_or_else(|| BookingError::InvalidSelection("no seat selected".to_string()))?;
        let session_id = state
            .session_id
            .ok_or_else(|| BookingError::InvalidSelection("no session selected".to_string()))?;
        let PendingSeat { seat_id, row, number } = pending;

        // Committed state, not the candidate snapshot
        let seat = match self.catalog.get_seat(seat_id).await? {
            Some(seat) if seat.session_id == session_id => seat,
            _ => {
                self.discard_candidate(conversation_id).await;
                return Err(BookingError::SeatNotFound { row, number });
            }
        };
        if seat.is_booked {
            self.discard_candidate(conversation_id).await;
            return Err(BookingError::SeatAlreadyBooked { row, number });
        }

        let session = self.catalog.get_session(session_id).await?;
        let movie = match &session {
            Some(s) => self.catalog.get_movie(s.movie_id).await?,
            None => None,
        };
        let cinema = match &session {
            Some(s) => self.catalog.get_cinema(s.cinema_id).await?,
            None => None,
        };
        let (Some(session), Some(movie), Some(cinema)) = (session, movie, cinema) else {
            return Err(BookingError::InvalidSelection(format!(
                "session {} is no longer available",
                session_id
            )));
        };

        match self.catalog.try_book_seat(seat_id).await? {
            BookOutcome::Booked => {}
            BookOutcome::AlreadyBooked => {
                warn!("Conversation {} lost the race for seat {}", conversation_id, seat_id);
                self.discard_candidate(conversation_id).await;
                return Err(BookingError::ConcurrentBookingConflict { row, number });
            }
            BookOutcome::NotFound => {
                self.discard_candidate(conversation_id).await;
                return Err(BookingError::SeatNotFound { row, number });
            }
        }

        let booked_at = Utc::now();
        info!(
            "Booking confirmed: conversation {}, session {}, seat {} (row {}, number {})",
            conversation_id, session_id, seat_id, row, number
        );

        let _ = self.events.send(BookingEvent::SeatBooked {
            conversation_id: conversation_id.to_string(),
            seat_id,
            session_id,
            row,
            number,
            booked_at,
        });

        // The seat is committed at this point; a failed cleanup must not
        // turn a successful booking into an error.
        if let Err(e) = self.tracker.clear(conversation_id).await {
            error!("Failed to clear conversation {} after booking: {}", conversation_id, e);
        }

        Ok(BookingSummary {
            seat_id,
            session_id,
            movie_title: movie.title,
            cinema_name: cinema.name,
            cinema_address: cinema.address,
            date: session.date,
            time: session.time,
            row,
            number,
            booked_at,
        })
    }

    /// SeatPending -> SessionChosen. The seat itself was never touched.
    pub async fn cancel(&self, conversation_id: &str) -> BookingResult<PendingSeat> {
        let state = self.tracker.get(conversation_id).await?;
        let pending = state.pending_seat.ok_or_else(|| {
            BookingError::InvalidSelection("no seat selection to cancel".to_string())
        })?;

        self.tracker.clear_pending_seat(conversation_id).await?;
        info!("Conversation {} released candidate seat {}", conversation_id, pending.seat_id);
        Ok(pending)
    }

    /// The seat error is what the caller needs to see; the conversation may
    /// already be gone if a parallel confirm on it won.
    async fn discard_candidate(&self, conversation_id: &str) {
        if let Err(e) = self.tracker.clear_pending_seat(conversation_id).await {
            warn!("Could not discard candidate seat for conversation {}: {}", conversation_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use tokio::sync::Barrier;
    use cinemastar_catalog::{CatalogSeed, InMemoryCatalog};
    use crate::conversation::{
        BookingStage, ConversationState, ConversationStore, InMemoryConversationStore,
    };

    /// Once armed, holds the next `gated` loads until all of them have
    /// arrived, so parallel confirms all read the same pending seat.
    struct GatedLoadStore {
        inner: InMemoryConversationStore,
        gate: Barrier,
        gated: usize,
        loads: AtomicUsize,
    }

    impl GatedLoadStore {
        fn new(gated: usize) -> Self {
            Self {
                inner: InMemoryConversationStore::new(),
                gate: Barrier::new(gated),
                gated,
                loads: AtomicUsize::new(gated),
            }
        }

        fn arm(&self) {
            self.loads.store(0, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ConversationStore for GatedLoadStore {
        async fn load(&self, conversation_id: &str) -> BookingResult<Option<ConversationState>> {
            let state = self.inner.load(conversation_id).await?;
            if self.loads.fetch_add(1, Ordering::SeqCst) < self.gated {
                self.gate.wait().await;
            }
            Ok(state)
        }

        async fn save(
            &self,
            conversation_id: &str,
            state: &ConversationState,
        ) -> BookingResult<()> {
            self.inner.save(conversation_id, state).await
        }

        async fn remove(&self, conversation_id: &str) -> BookingResult<()> {
            self.inner.remove(conversation_id).await
        }

        async fn evict_idle(&self, cutoff: DateTime<Utc>) -> BookingResult<usize> {
            self.inner.evict_idle(cutoff).await
        }
    }

    async fn setup() -> (Arc<InMemoryCatalog>, Arc<ConversationTracker>, ReservationEngine) {
        let catalog = Arc::new(InMemoryCatalog::from_seed(CatalogSeed::default_seed()).unwrap());
        let store = Arc::new(InMemoryConversationStore::new());
        let tracker = Arc::new(ConversationTracker::new(store));
        let engine = ReservationEngine::new(catalog.clone(), tracker.clone());

        tracker.start("chat").await.unwrap();
        tracker.set_cinema("chat", 1).await.unwrap();
        tracker.set_movie("chat", 1).await.unwrap();
        tracker.set_session("chat", 1).await.unwrap();
        (catalog, tracker, engine)
    }

    #[tokio::test]
    async fn test_choose_requires_session() {
        let (_, tracker, engine) = setup().await;
        tracker.start("other").await.unwrap();

        let err = engine.choose_seat("other", 1, 1).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidSelection(_)));

        let err = engine.choose_seat("nobody", 1, 1).await.unwrap_err();
        assert!(matches!(err, BookingError::UnknownConversation(_)));
    }

    #[tokio::test]
    async fn test_reselect_overwrites_candidate() {
        let (_, tracker, engine) = setup().await;

        engine.choose_seat("chat", 1, 1).await.unwrap();
        let second = engine.choose_seat("chat", 2, 7).await.unwrap();

        let state = tracker.get("chat").await.unwrap();
        assert_eq!(state.pending_seat, Some(second));
        assert_eq!(state.stage(), BookingStage::SeatPending);
    }

    #[tokio::test]
    async fn test_failed_choice_keeps_previous_candidate() {
        let (_, tracker, engine) = setup().await;

        let first = engine.choose_seat("chat", 4, 4).await.unwrap();
        let err = engine.choose_seat("chat", 10, 1).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatNotFound { row: 10, number: 1 }));
        assert_eq!(tracker.get("chat").await.unwrap().pending_seat, Some(first));
    }

    #[tokio::test]
    async fn test_confirm_without_candidate_is_rejected() {
        let (_, tracker, engine) = setup().await;

        let err = engine.confirm("chat").await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidSelection(_)));
        assert_eq!(tracker.get("chat").await.unwrap().stage(), BookingStage::SessionChosen);
    }

    #[tokio::test]
    async fn test_confirm_books_and_clears() {
        let (catalog, tracker, engine) = setup().await;
        let mut events = engine.subscribe();

        engine.choose_seat("chat", 9, 13).await.unwrap();
        let summary = engine.confirm("chat").await.unwrap();

        assert_eq!(summary.movie_title, "Дюна");
        assert_eq!(summary.cinema_name, "Киномакс");
        assert_eq!((summary.row, summary.number), (9, 13));
        assert!(catalog.get_seat(summary.seat_id).await.unwrap().unwrap().is_booked);
        assert!(matches!(
            tracker.get("chat").await.unwrap_err(),
            BookingError::UnknownConversation(_)
        ));

        match events.try_recv().unwrap() {
            BookingEvent::SeatBooked { seat_id, conversation_id, .. } => {
                assert_eq!(seat_id, summary.seat_id);
                assert_eq!(conversation_id, "chat");
            }
        }
    }

    #[tokio::test]
    async fn test_confirm_withdrawn_seat() {
        let (catalog, tracker, engine) = setup().await;

        let pending = engine.choose_seat("chat", 2, 2).await.unwrap();
        assert!(catalog.withdraw_seat(pending.seat_id));

        let err = engine.confirm("chat").await.unwrap_err();
        assert!(matches!(err, BookingError::SeatNotFound { row: 2, number: 2 }));
        assert_eq!(tracker.get("chat").await.unwrap().stage(), BookingStage::SessionChosen);
    }

    #[tokio::test]
    async fn test_cancel_leaves_seat_free() {
        let (catalog, tracker, engine) = setup().await;

        let pending = engine.choose_seat("chat", 3, 3).await.unwrap();
        let released = engine.cancel("chat").await.unwrap();
        assert_eq!(released, pending);

        assert!(!catalog.get_seat(pending.seat_id).await.unwrap().unwrap().is_booked);
        assert_eq!(tracker.get("chat").await.unwrap().stage(), BookingStage::SessionChosen);

        let err = engine.cancel("chat").await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidSelection(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_double_confirm_on_one_conversation_reports_seat_conflict() {
        let catalog = Arc::new(InMemoryCatalog::from_seed(CatalogSeed::default_seed()).unwrap());
        let store = Arc::new(GatedLoadStore::new(2));
        let tracker = Arc::new(ConversationTracker::new(store.clone()));
        let engine = Arc::new(ReservationEngine::new(catalog.clone(), tracker.clone()));

        tracker.start("c").await.unwrap();
        tracker.set_cinema("c", 1).await.unwrap();
        tracker.set_movie("c", 1).await.unwrap();
        tracker.set_session("c", 1).await.unwrap();
        let pending = engine.choose_seat("c", 1, 1).await.unwrap();

        store.arm();
        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.confirm("c").await }
        });
        let second = tokio::spawn({
            let engine = engine.clone();
            async move { engine.confirm("c").await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        let booked = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(booked, 1);
        let loser = results.into_iter().find_map(Result::err).unwrap();
        assert!(
            matches!(
                loser,
                BookingError::ConcurrentBookingConflict { row: 1, number: 1 }
                    | BookingError::SeatAlreadyBooked { row: 1, number: 1 }
            ),
            "unexpected error: {:?}",
            loser
        );
        assert!(catalog.get_seat(pending.seat_id).await.unwrap().unwrap().is_booked);
    }
}
