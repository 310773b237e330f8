use std::collections::HashSet;
use std::path::Path;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use crate::models::{Cinema, Movie, Seat, Session, DEFAULT_ROWS, DEFAULT_SEATS_PER_ROW};
use crate::store::{CatalogError, CatalogResult};

/// Bulk catalog data loaded once at startup.
///
/// Seats are not part of the seed: every session gets a full
/// `rows x seats_per_row` grid of free seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSeed {
    pub cinemas: Vec<Cinema>,
    pub movies: Vec<Movie>,
    pub sessions: Vec<Session>,
}

impl CatalogSeed {
    /// The two-cinema, two-movie showcase the bot ships with
    pub fn default_seed() -> Self {
        Self {
            cinemas: vec![
                Cinema {
                    id: 1,
                    name: "Киномакс".to_string(),
                    address: "ул. Пушкина, 10".to_string(),
                },
                Cinema {
                    id: 2,
                    name: "Синема Парк".to_string(),
                    address: "ул. Ленина, 5".to_string(),
                },
            ],
            movies: vec![
                Movie {
                    id: 1,
                    title: "Дюна".to_string(),
                    description: Some("Фантастика".to_string()),
                },
                Movie {
                    id: 2,
                    title: "Крепкий орешек".to_string(),
                    description: Some("Боевик".to_string()),
                },
            ],
            sessions: vec![
                Session {
                    id: 1,
                    movie_id: 1,
                    cinema_id: 1,
                    date: NaiveDate::from_ymd_opt(2024, 12, 20).unwrap_or_default(),
                    time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
                    rows: DEFAULT_ROWS,
                    seats_per_row: DEFAULT_SEATS_PER_ROW,
                },
                Session {
                    id: 2,
                    movie_id: 2,
                    cinema_id: 2,
                    date: NaiveDate::from_ymd_opt(2024, 12, 21).unwrap_or_default(),
                    time: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
                    rows: DEFAULT_ROWS,
                    seats_per_row: DEFAULT_SEATS_PER_ROW,
                },
            ],
        }
    }

    pub fn from_json_str(raw: &str) -> CatalogResult<Self> {
        let seed: Self = serde_json::from_str(raw)
            .map_err(|e| CatalogError::InvalidSeed(e.to_string()))?;
        seed.validate()?;
        Ok(seed)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::InvalidSeed(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Checks id uniqueness, session references and grid bounds
    pub fn validate(&self) -> CatalogResult<()> {
        let mut cinema_ids = HashSet::new();
        for cinema in &self.cinemas {
            if !cinema_ids.insert(cinema.id) {
                return Err(CatalogError::InvalidSeed(format!("duplicate cinema id {}", cinema.id)));
            }
        }

        let mut movie_ids = HashSet::new();
        for movie in &self.movies {
            if !movie_ids.insert(movie.id) {
                return Err(CatalogError::InvalidSeed(format!("duplicate movie id {}", movie.id)));
            }
        }

        let mut session_ids = HashSet::new();
        for session in &self.sessions {
            if !session_ids.insert(session.id) {
                return Err(CatalogError::InvalidSeed(format!(
                    "duplicate session id {}",
                    session.id
                )));
            }
            if !cinema_ids.contains(&session.cinema_id) {
                return Err(CatalogError::InvalidSeed(format!(
                    "session {} references unknown cinema {}",
                    session.id, session.cinema_id
                )));
            }
            if !movie_ids.contains(&session.movie_id) {
                return Err(CatalogError::InvalidSeed(format!(
                    "session {} references unknown movie {}",
                    session.id, session.movie_id
                )));
            }
            if session.rows < 1 || session.seats_per_row < 1 {
                return Err(CatalogError::InvalidSeed(format!(
                    "session {} has an empty seat grid ({}x{})",
                    session.id, session.rows, session.seats_per_row
                )));
            }
        }

        Ok(())
    }

    /// Full free seat grid for every session; ids are assigned from 1
    /// in session, row, number order.
    pub fn seat_grid(&self) -> Vec<Seat> {
        let mut seats = Vec::new();
        let mut next_id = 1;
        for session in &self.sessions {
            for row in 1..=session.rows {
                for number in 1..=session.seats_per_row {
                    seats.push(Seat {
                        id: next_id,
                        session_id: session.id,
                        row,
                        number,
                        is_booked: false,
                    });
                    next_id += 1;
                }
            }
        }
        seats
    }
}
