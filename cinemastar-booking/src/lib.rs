pub mod error;
pub mod conversation;
pub mod tracker;
pub mod engine;
pub mod dialogue;
pub mod events;

pub use error::{BookingError, BookingResult};
pub use conversation::{
    BookingStage, ConversationState, ConversationStore, InMemoryConversationStore, PendingSeat,
};
pub use tracker::ConversationTracker;
pub use engine::{BookingSummary, ReservationEngine};
pub use dialogue::{Choice, DialogueController, Offer, Reply, ReplyBody, Step, UserInput};
pub use events::BookingEvent;
