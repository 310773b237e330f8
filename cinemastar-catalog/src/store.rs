use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::models::{Cinema, Movie, Seat, Session};

/// Result of the atomic "set booked only if currently free" operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookOutcome {
    Booked,
    AlreadyBooked,
    NotFound,
}

/// Read access to cinemas, movies, sessions and seats, plus the single
/// permitted mutation: booking a seat.
///
/// Lookups report absence through `Option`/empty vectors; `Err` is reserved
/// for backend failures.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_cinemas(&self) -> CatalogResult<Vec<Cinema>>;

    /// Movies with at least one session at the cinema, deduplicated by id
    async fn list_movies_at(&self, cinema_id: i64) -> CatalogResult<Vec<Movie>>;

    async fn list_sessions(&self, cinema_id: i64, movie_id: i64) -> CatalogResult<Vec<Session>>;

    /// Seats of a session ordered by row, then number
    async fn list_seats(&self, session_id: i64) -> CatalogResult<Vec<Seat>>;

    async fn get_cinema(&self, id: i64) -> CatalogResult<Option<Cinema>>;

    async fn get_movie(&self, id: i64) -> CatalogResult<Option<Movie>>;

    async fn get_session(&self, id: i64) -> CatalogResult<Option<Session>>;

    async fn get_seat(&self, seat_id: i64) -> CatalogResult<Option<Seat>>;

    async fn find_seat(
        &self,
        session_id: i64,
        row: i32,
        number: i32,
    ) -> CatalogResult<Option<Seat>>;

    /// Compare-and-swap on the booking flag: false -> true, never back.
    ///
    /// Implementations must perform the check and the write as one atomic
    /// step so that concurrent callers for the same seat see exactly one
    /// `Booked`.
    async fn try_book_seat(&self, seat_id: i64) -> CatalogResult<BookOutcome>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Catalog backend error: {0}")]
    Backend(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
