use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use cinemastar_booking::{BookingEvent, ConversationTracker};

/// Periodically drops conversations idle for longer than the tracker's TTL
pub fn spawn_idle_sweeper(tracker: Arc<ConversationTracker>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        info!("Idle conversation sweeper started, running every {}s", every.as_secs());

        loop {
            ticker.tick().await;
            match tracker.evict_idle().await {
                Ok(0) => {}
                Ok(evicted) => info!("Evicted {} idle conversations", evicted),
                Err(e) => error!("Failed to evict idle conversations: {}", e),
            }
        }
    })
}

/// Writes one audit line per confirmed booking
pub fn spawn_booking_audit(mut events: broadcast::Receiver<BookingEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BookingEvent::SeatBooked {
                    conversation_id,
                    seat_id,
                    session_id,
                    row,
                    number,
                    booked_at,
                }) => {
                    info!(
                        conversation_id = %conversation_id,
                        seat_id,
                        session_id,
                        row,
                        number,
                        booked_at = %booked_at,
                        "Seat booked"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Booking audit lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cinemastar_booking::{ConversationState, ConversationStore, InMemoryConversationStore};

    #[tokio::test]
    async fn test_sweeper_evicts_stale_conversations() {
        let store = Arc::new(InMemoryConversationStore::new());
        let tracker = Arc::new(
            ConversationTracker::new(store.clone()).with_idle_ttl(chrono::Duration::seconds(60)),
        );

        let mut stale = ConversationState::new();
        stale.updated_at = Utc::now() - chrono::Duration::seconds(120);
        store.save("stale", &stale).await.unwrap();
        tracker.start("fresh").await.unwrap();

        let handle = spawn_idle_sweeper(tracker.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(store.len().await, 1);
        assert!(tracker.get("fresh").await.is_ok());
    }
}
