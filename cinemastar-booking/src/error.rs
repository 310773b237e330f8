use cinemastar_catalog::CatalogError;

/// Errors surfaced to a conversation. None of them are fatal: a failed step
/// leaves the conversation where it was and the user can retry.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Seat not found: row {row}, number {number}")]
    SeatNotFound { row: i32, number: i32 },

    #[error("Seat already booked: row {row}, number {number}")]
    SeatAlreadyBooked { row: i32, number: i32 },

    #[error("Seat was booked by another customer while confirming: row {row}, number {number}")]
    ConcurrentBookingConflict { row: i32, number: i32 },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Conversation store error: {0}")]
    Store(String),
}

impl BookingError {
    /// Whether the user can act on this error (as opposed to a backend fault)
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, BookingError::Catalog(_) | BookingError::Store(_))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
