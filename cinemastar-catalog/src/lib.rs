pub mod models;
pub mod store;
pub mod memory;
pub mod seed;
pub mod seat_map;

pub use models::{Cinema, Movie, Seat, Session};
pub use store::{BookOutcome, CatalogError, CatalogResult, CatalogStore};
pub use memory::InMemoryCatalog;
pub use seed::CatalogSeed;
pub use seat_map::{SeatMap, SeatState};
