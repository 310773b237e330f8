use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use cinemastar_catalog::{CatalogStore, SeatMap};
use crate::conversation::{BookingStage, ConversationState, PendingSeat};
use crate::engine::{BookingSummary, ReservationEngine};
use crate::error::{BookingError, BookingResult};
use crate::tracker::ConversationTracker;

/// One inbound user message, already reduced to an intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Start,
    /// Free text meant to match one of the offered choices
    Choose(String),
    SelectSeat { row: i32, number: i32 },
    Confirm,
    Cancel,
}

impl UserInput {
    /// Understands `/start`, `confirm`, `cancel` and the legacy keyboard
    /// captions at any stage. Seat coordinates (`seat <row> <number>` or
    /// `<row>:<number>`) are only read once a session is chosen, so earlier
    /// on a label like "2:22" stays a plain choice.
    pub fn parse(text: &str, stage: BookingStage) -> Self {
        let text = text.trim();
        let lower = text.to_lowercase();

        match lower.as_str() {
            "/start" => return UserInput::Start,
            "confirm" | "✅ подтвердить бронь" => return UserInput::Confirm,
            "cancel" | "❌ отменить выбор" | "отменить выбор" => return UserInput::Cancel,
            _ => {}
        }

        if matches!(stage, BookingStage::SessionChosen | BookingStage::SeatPending) {
            if let Some((row, number)) = parse_seat_coordinates(text, &lower) {
                return UserInput::SelectSeat { row, number };
            }
        }

        UserInput::Choose(text.to_string())
    }
}

fn parse_seat_coordinates(text: &str, lower: &str) -> Option<(i32, i32)> {
    if let Some(rest) = lower.strip_prefix("seat ") {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if let [row, number] = parts.as_slice() {
            return Some((parse_coordinate(row)?, parse_coordinate(number)?));
        }
        return None;
    }

    let (row, number) = text.split_once(':')?;
    Some((parse_coordinate(row)?, parse_coordinate(number)?))
}

/// Integers too wide for `i32` saturate, which no seat grid contains
fn parse_coordinate(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let digits = raw
        .strip_prefix('-')
        .or_else(|| raw.strip_prefix('+'))
        .unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    match raw.parse::<i32>() {
        Ok(value) => Some(value),
        Err(_) if raw.starts_with('-') => Some(i32::MIN),
        Err(_) => Some(i32::MAX),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Cinema,
    Movie,
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    pub id: i64,
    pub label: String,
    pub detail: Option<String>,
}

/// What the conversation can do next, given its current state
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Offer {
    Choices { step: Step, options: Vec<Choice> },
    Seats { seat_map: SeatMap },
    Confirmation { seat: PendingSeat },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyBody {
    Choices { step: Step, options: Vec<Choice> },
    SeatMap { seat_map: SeatMap },
    SeatHeld { seat: PendingSeat },
    SelectionCancelled { seat_map: SeatMap },
    Booked { summary: BookingSummary },
}

/// Structured outbound record for the rendering collaborator
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub stage: BookingStage,
    pub body: ReplyBody,
}

/// Projects conversation state onto the choices on offer and routes user
/// input to the tracker or the reservation engine. Never writes catalog data.
pub struct DialogueController {
    catalog: Arc<dyn CatalogStore>,
    tracker: Arc<ConversationTracker>,
    engine: Arc<ReservationEngine>,
}

impl DialogueController {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        tracker: Arc<ConversationTracker>,
        engine: Arc<ReservationEngine>,
    ) -> Self {
        Self { catalog, tracker, engine }
    }

    pub async fn handle_text(&self, conversation_id: &str, text: &str) -> BookingResult<Reply> {
        let stage = match self.tracker.get(conversation_id).await {
            Ok(state) => state.stage(),
            Err(BookingError::UnknownConversation(_)) => BookingStage::Idle,
            Err(e) => return Err(e),
        };
        self.handle(conversation_id, UserInput::parse(text, stage)).await
    }

    pub async fn handle(&self, conversation_id: &str, input: UserInput) -> BookingResult<Reply> {
        debug!("Conversation {} input: {:?}", conversation_id, input);

        match input {
            UserInput::Start => {
                let state = self.tracker.start(conversation_id).await?;
                self.reply_with_offer(&state).await
            }
            UserInput::Choose(text) => self.choose(conversation_id, &text).await,
            UserInput::SelectSeat { row, number } => {
                let seat = self.engine.choose_seat(conversation_id, row, number).await?;
                Ok(Reply {
                    stage: BookingStage::SeatPending,
                    body: ReplyBody::SeatHeld { seat },
                })
            }
            UserInput::Confirm => {
                let summary = self.engine.confirm(conversation_id).await?;
                Ok(Reply {
                    stage: BookingStage::Confirmed,
                    body: ReplyBody::Booked { summary },
                })
            }
            UserInput::Cancel => {
                self.engine.cancel(conversation_id).await?;
                let state = self.tracker.get(conversation_id).await?;
                let seat_map = self.seat_map_for(&state).await?;
                Ok(Reply {
                    stage: state.stage(),
                    body: ReplyBody::SelectionCancelled { seat_map },
                })
            }
        }
    }

    /// Valid next steps for the conversation, read fresh from the catalog
    pub async fn offered(&self, conversation_id: &str) -> BookingResult<Offer> {
        let state = self.tracker.get(conversation_id).await?;
        self.offer_for(&state).await
    }

    async fn offer_for(&self, state: &ConversationState) -> BookingResult<Offer> {
        let offer = match (state.stage(), state.cinema_id, state.movie_id) {
            (BookingStage::Idle, _, _) => Offer::Choices {
                step: Step::Cinema,
                options: self
                    .catalog
                    .list_cinemas()
                    .await?
                    .into_iter()
                    .map(|c| Choice { id: c.id, label: c.address, detail: Some(c.name) })
                    .collect(),
            },
            (BookingStage::CinemaChosen, Some(cinema_id), _) => Offer::Choices {
                step: Step::Movie,
                options: self
                    .catalog
                    .list_movies_at(cinema_id)
                    .await?
                    .into_iter()
                    .map(|m| Choice { id: m.id, label: m.title, detail: m.description })
                    .collect(),
            },
            (BookingStage::MovieChosen, Some(cinema_id), Some(movie_id)) => Offer::Choices {
                step: Step::Session,
                options: self
                    .catalog
                    .list_sessions(cinema_id, movie_id)
                    .await?
                    .into_iter()
                    .map(|s| Choice { id: s.id, label: s.label(), detail: None })
                    .collect(),
            },
            (BookingStage::SessionChosen, _, _) => Offer::Seats {
                seat_map: self.seat_map_for(state).await?,
            },
            (BookingStage::SeatPending, _, _) => match state.pending_seat {
                Some(seat) => Offer::Confirmation { seat },
                None => return Err(BookingError::InvalidSelection("no seat selected".to_string())),
            },
            _ => {
                return Err(BookingError::InvalidSelection(
                    "conversation state is incomplete, send /start".to_string(),
                ))
            }
        };
        Ok(offer)
    }

    async fn choose(&self, conversation_id: &str, text: &str) -> BookingResult<Reply> {
        let state = self.tracker.get(conversation_id).await?;
        let (step, options) = match self.offer_for(&state).await? {
            Offer::Choices { step, options } => (step, options),
            _ => {
                warn!(
                    "Conversation {} sent free text at stage {:?}",
                    conversation_id,
                    state.stage()
                );
                return Err(BookingError::InvalidSelection(format!(
                    "'{}' is not an available option here",
                    text
                )));
            }
        };

        let choice = resolve_choice(&options, text)?;
        let next = match step {
            Step::Cinema => self.tracker.set_cinema(conversation_id, choice.id).await?,
            Step::Movie => self.tracker.set_movie(conversation_id, choice.id).await?,
            Step::Session => self.tracker.set_session(conversation_id, choice.id).await?,
        };
        self.reply_with_offer(&next).await
    }

    async fn reply_with_offer(&self, state: &ConversationState) -> BookingResult<Reply> {
        let body = match self.offer_for(state).await? {
            Offer::Choices { step, options } => ReplyBody::Choices { step, options },
            Offer::Seats { seat_map } => ReplyBody::SeatMap { seat_map },
            Offer::Confirmation { seat } => ReplyBody::SeatHeld { seat },
        };
        Ok(Reply { stage: state.stage(), body })
    }

    async fn seat_map_for(&self, state: &ConversationState) -> BookingResult<SeatMap> {
        let session_id = state
            .session_id
            .ok_or_else(|| BookingError::InvalidSelection("no session selected".to_string()))?;
        let session = self.catalog.get_session(session_id).await?.ok_or_else(|| {
            BookingError::InvalidSelection(format!("session {} is no longer available", session_id))
        })?;
        let seats = self.catalog.list_seats(session_id).await?;
        Ok(SeatMap::from_seats(&session, &seats))
    }
}

/// Match by exact label, or by `#<id>`. Labels shared by several options
/// are ambiguous and rejected.
fn resolve_choice<'a>(options: &'a [Choice], text: &str) -> BookingResult<&'a Choice> {
    let text = text.trim();

    if let Some(id) = text.strip_prefix('#').and_then(|raw| raw.parse::<i64>().ok()) {
        return options.iter().find(|c| c.id == id).ok_or_else(|| {
            BookingError::InvalidSelection(format!("'{}' is not among the offered choices", text))
        });
    }

    let mut matches = options.iter().filter(|c| c.label == text);
    match (matches.next(), matches.next()) {
        (Some(choice), None) => Ok(choice),
        (Some(_), Some(_)) => Err(BookingError::InvalidSelection(format!(
            "'{}' matches several choices, pick one by #id",
            text
        ))),
        (None, _) => Err(BookingError::InvalidSelection(format!(
            "'{}' is not among the offered choices",
            text
        ))),
    }
}
