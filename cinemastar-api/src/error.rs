use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use cinemastar_booking::BookingError;
use cinemastar_catalog::CatalogError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    Booking(BookingError),
    NotFoundError(String),
    InternalServerError(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFoundError(_) => "NOT_FOUND",
            AppError::Booking(err) => match err {
                BookingError::UnknownConversation(_) => "UNKNOWN_CONVERSATION",
                BookingError::InvalidSelection(_) => "INVALID_SELECTION",
                BookingError::SeatNotFound { .. } => "SEAT_NOT_FOUND",
                BookingError::SeatAlreadyBooked { .. } => "SEAT_ALREADY_BOOKED",
                BookingError::ConcurrentBookingConflict { .. } => "CONCURRENT_BOOKING_CONFLICT",
                BookingError::Catalog(_) | BookingError::Store(_) => "INTERNAL_ERROR",
            },
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Booking(err) => {
                let status = match &err {
                    BookingError::UnknownConversation(_) => StatusCode::NOT_FOUND,
                    BookingError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
                    BookingError::SeatNotFound { .. } => StatusCode::NOT_FOUND,
                    BookingError::SeatAlreadyBooked { .. }
                    | BookingError::ConcurrentBookingConflict { .. } => StatusCode::CONFLICT,
                    BookingError::Catalog(_) | BookingError::Store(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if err.is_user_facing() {
                    tracing::warn!("Booking step rejected: {}", err);
                    (status, err.to_string())
                } else {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, "Internal Server Error".to_string())
                }
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::InternalServerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_backend_errors_are_opaque_500s() {
        let err = AppError::from(CatalogError::Backend("connection reset".to_string()));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"], "Internal Server Error");

        let err = AppError::from(BookingError::Store("redis down".to_string()));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_seat_conflicts_are_409() {
        let err = AppError::from(BookingError::ConcurrentBookingConflict { row: 2, number: 2 });
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONCURRENT_BOOKING_CONFLICT");
    }
}
