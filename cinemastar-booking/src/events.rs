use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    SeatBooked {
        conversation_id: String,
        seat_id: i64,
        session_id: i64,
        row: i32,
        number: i32,
        booked_at: DateTime<Utc>,
    },
}
