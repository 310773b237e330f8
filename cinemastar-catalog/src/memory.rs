use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU8, Ordering};
use async_trait::async_trait;
use tracing::{debug, info};
use crate::models::{Cinema, Movie, Seat, Session};
use crate::seed::CatalogSeed;
use crate::store::{BookOutcome, CatalogError, CatalogResult, CatalogStore};

const FREE: u8 = 0;
const BOOKED: u8 = 1;
const WITHDRAWN: u8 = 2;

/// Seat record whose mutable part is a single atomic state word
struct SeatSlot {
    id: i64,
    session_id: i64,
    row: i32,
    number: i32,
    state: AtomicU8,
}

impl SeatSlot {
    fn snapshot(&self) -> Option<Seat> {
        match self.state.load(Ordering::Acquire) {
            WITHDRAWN => None,
            state => Some(Seat {
                id: self.id,
                session_id: self.session_id,
                row: self.row,
                number: self.number,
                is_booked: state == BOOKED,
            }),
        }
    }
}

/// Process-local catalog built from a [`CatalogSeed`].
///
/// Cinemas, movies and sessions are immutable after construction. Each seat
/// carries an `AtomicU8` so booking is a lock-free compare-and-swap.
pub struct InMemoryCatalog {
    cinemas: Vec<Cinema>,
    movies: Vec<Movie>,
    sessions: Vec<Session>,
    seats: HashMap<i64, SeatSlot>,
    // (session_id, row, number) -> seat id; BTreeMap keeps row/number order
    grid: BTreeMap<(i64, i32, i32), i64>,
}

impl InMemoryCatalog {
    pub fn from_seed(seed: CatalogSeed) -> CatalogResult<Self> {
        seed.validate()?;

        let mut seats = HashMap::new();
        let mut grid = BTreeMap::new();
        for seat in seed.seat_grid() {
            if grid.insert((seat.session_id, seat.row, seat.number), seat.id).is_some() {
                return Err(CatalogError::InvalidSeed(format!(
                    "duplicate seat ({}, {}, {})",
                    seat.session_id, seat.row, seat.number
                )));
            }
            seats.insert(seat.id, SeatSlot {
                id: seat.id,
                session_id: seat.session_id,
                row: seat.row,
                number: seat.number,
                state: AtomicU8::new(if seat.is_booked { BOOKED } else { FREE }),
            });
        }

        info!(
            "In-memory catalog seeded: {} cinemas, {} movies, {} sessions, {} seats",
            seed.cinemas.len(),
            seed.movies.len(),
            seed.sessions.len(),
            seats.len()
        );

        Ok(Self {
            cinemas: seed.cinemas,
            movies: seed.movies,
            sessions: seed.sessions,
            seats,
            grid,
        })
    }

    /// Take a free seat out of service. Booked seats stay booked.
    pub fn withdraw_seat(&self, seat_id: i64) -> bool {
        self.seats
            .get(&seat_id)
            .map(|slot| {
                slot.state
                    .compare_exchange(FREE, WITHDRAWN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_cinemas(&self) -> CatalogResult<Vec<Cinema>> {
        Ok(self.cinemas.clone())
    }

    async fn list_movies_at(&self, cinema_id: i64) -> CatalogResult<Vec<Movie>> {
        let mut movie_ids: Vec<i64> = Vec::new();
        for session in self.sessions.iter().filter(|s| s.cinema_id == cinema_id) {
            if !movie_ids.contains(&session.movie_id) {
                movie_ids.push(session.movie_id);
            }
        }

        Ok(movie_ids
            .into_iter()
            .filter_map(|id| self.movies.iter().find(|m| m.id == id).cloned())
            .collect())
    }

    async fn list_sessions(&self, cinema_id: i64, movie_id: i64) -> CatalogResult<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.cinema_id == cinema_id && s.movie_id == movie_id)
            .cloned()
            .collect())
    }

    async fn list_seats(&self, session_id: i64) -> CatalogResult<Vec<Seat>> {
        let seats: Vec<Seat> = self
            .grid
            .range((session_id, i32::MIN, i32::MIN)..=(session_id, i32::MAX, i32::MAX))
            .filter_map(|(_, id)| self.seats.get(id).and_then(SeatSlot::snapshot))
            .collect();
        debug!("Listed {} seats for session {}", seats.len(), session_id);
        Ok(seats)
    }

    async fn get_cinema(&self, id: i64) -> CatalogResult<Option<Cinema>> {
        Ok(self.cinemas.iter().find(|c| c.id == id).cloned())
    }

    async fn get_movie(&self, id: i64) -> CatalogResult<Option<Movie>> {
        Ok(self.movies.iter().find(|m| m.id == id).cloned())
    }

    async fn get_session(&self, id: i64) -> CatalogResult<Option<Session>> {
        Ok(self.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn get_seat(&self, seat_id: i64) -> CatalogResult<Option<Seat>> {
        Ok(self.seats.get(&seat_id).and_then(SeatSlot::snapshot))
    }

    async fn find_seat(
        &self,
        session_id: i64,
        row: i32,
        number: i32,
    ) -> CatalogResult<Option<Seat>> {
        Ok(self
            .grid
            .get(&(session_id, row, number))
            .and_then(|id| self.seats.get(id))
            .and_then(SeatSlot::snapshot))
    }

    async fn try_book_seat(&self, seat_id: i64) -> CatalogResult<BookOutcome> {
        let Some(slot) = self.seats.get(&seat_id) else {
            return Ok(BookOutcome::NotFound);
        };

        let outcome = match slot
            .state
            .compare_exchange(FREE, BOOKED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => BookOutcome::Booked,
            Err(BOOKED) => BookOutcome::AlreadyBooked,
            Err(_) => BookOutcome::NotFound,
        };
        debug!("Seat {} booking attempt: {:?}", seat_id, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_seed(CatalogSeed::default_seed()).unwrap()
    }

    #[tokio::test]
    async fn test_catalog_queries() {
        let catalog = catalog();

        assert_eq!(catalog.list_cinemas().await.unwrap().len(), 2);

        let movies = catalog.list_movies_at(1).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Дюна");

        assert!(catalog.list_movies_at(99).await.unwrap().is_empty());
        assert_eq!(catalog.list_sessions(1, 1).await.unwrap().len(), 1);
        assert!(catalog.list_sessions(1, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_movies_deduplicated_per_cinema() {
        let mut seed = CatalogSeed::default_seed();
        let mut evening = seed.sessions[0].clone();
        evening.id = 3;
        evening.time = chrono::NaiveTime::from_hms_opt(21, 0, 0).unwrap();
        seed.sessions.push(evening);

        let catalog = InMemoryCatalog::from_seed(seed).unwrap();
        assert_eq!(catalog.list_movies_at(1).await.unwrap().len(), 1);
        assert_eq!(catalog.list_sessions(1, 1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_seats_ordered_by_row_then_number() {
        let catalog = catalog();
        let seats = catalog.list_seats(2).await.unwrap();

        assert_eq!(seats.len(), 9 * 13);
        let coords: Vec<(i32, i32)> = seats.iter().map(|s| (s.row, s.number)).collect();
        let mut sorted = coords.clone();
        sorted.sort();
        assert_eq!(coords, sorted);
        assert!(seats.iter().all(|s| s.session_id == 2));
    }

    #[tokio::test]
    async fn test_book_seat_once() {
        let catalog = catalog();
        let seat = catalog.find_seat(1, 3, 4).await.unwrap().unwrap();

        assert_eq!(catalog.try_book_seat(seat.id).await.unwrap(), BookOutcome::Booked);
        assert_eq!(catalog.try_book_seat(seat.id).await.unwrap(), BookOutcome::AlreadyBooked);
        assert!(catalog.get_seat(seat.id).await.unwrap().unwrap().is_booked);
        assert_eq!(catalog.try_book_seat(-1).await.unwrap(), BookOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_withdrawn_seat_disappears() {
        let catalog = catalog();
        let seat = catalog.find_seat(1, 1, 1).await.unwrap().unwrap();

        assert!(catalog.withdraw_seat(seat.id));
        assert!(catalog.get_seat(seat.id).await.unwrap().is_none());
        assert!(catalog.find_seat(1, 1, 1).await.unwrap().is_none());
        assert_eq!(catalog.try_book_seat(seat.id).await.unwrap(), BookOutcome::NotFound);
        assert_eq!(catalog.list_seats(1).await.unwrap().len(), 9 * 13 - 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_booking_single_winner() {
        let catalog = Arc::new(catalog());
        let seat_id = catalog.find_seat(2, 5, 5).await.unwrap().unwrap().id;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move {
                catalog.try_book_seat(seat_id).await.unwrap()
            }));
        }

        let mut booked = 0;
        for handle in handles {
            if handle.await.unwrap() == BookOutcome::Booked {
                booked += 1;
            }
        }
        assert_eq!(booked, 1);
    }
}
