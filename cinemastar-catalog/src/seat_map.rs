use serde::{Deserialize, Serialize};
use crate::models::{Seat, Session};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Free,
    Booked,
    /// No seat record exists at this grid position
    Unavailable,
}

/// Point-in-time rendering of a session's seat grid.
///
/// The map can be stale by the time a user acts on it; booking always
/// re-reads the seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMap {
    pub session_id: i64,
    pub rows: i32,
    pub seats_per_row: i32,
    /// `grid[row - 1][number - 1]`
    pub grid: Vec<Vec<SeatState>>,
    pub free_seats: usize,
}

impl SeatMap {
    pub fn from_seats(session: &Session, seats: &[Seat]) -> Self {
        let rows = session.rows.max(0) as usize;
        let columns = session.seats_per_row.max(0) as usize;
        let mut grid = vec![vec![SeatState::Unavailable; columns]; rows];

        for seat in seats.iter().filter(|s| s.session_id == session.id) {
            if !session.contains(seat.row, seat.number) {
                continue;
            }
            grid[(seat.row - 1) as usize][(seat.number - 1) as usize] = if seat.is_booked {
                SeatState::Booked
            } else {
                SeatState::Free
            };
        }

        let free_seats = grid
            .iter()
            .flatten()
            .filter(|state| **state == SeatState::Free)
            .count();

        Self {
            session_id: session.id,
            rows: session.rows,
            seats_per_row: session.seats_per_row,
            grid,
            free_seats,
        }
    }

    pub fn state_at(&self, row: i32, number: i32) -> Option<SeatState> {
        if row < 1 || number < 1 {
            return None;
        }
        self.grid
            .get((row - 1) as usize)
            .and_then(|r| r.get((number - 1) as usize))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_seat_map_projection() {
        let session = Session {
            id: 5,
            movie_id: 1,
            cinema_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            rows: 2,
            seats_per_row: 3,
        };
        let seats = vec![
            Seat { id: 1, session_id: 5, row: 1, number: 1, is_booked: false },
            Seat { id: 2, session_id: 5, row: 1, number: 2, is_booked: true },
            Seat { id: 3, session_id: 5, row: 2, number: 3, is_booked: false },
            // Foreign and out-of-grid seats are ignored
            Seat { id: 4, session_id: 6, row: 1, number: 3, is_booked: true },
            Seat { id: 5, session_id: 5, row: 3, number: 1, is_booked: false },
        ];

        let map = SeatMap::from_seats(&session, &seats);
        assert_eq!(map.free_seats, 2);
        assert_eq!(map.state_at(1, 2), Some(SeatState::Booked));
        assert_eq!(map.state_at(1, 3), Some(SeatState::Unavailable));
        assert_eq!(map.state_at(2, 3), Some(SeatState::Free));
        assert_eq!(map.state_at(3, 1), None);
        assert_eq!(map.state_at(0, 1), None);
    }
}
