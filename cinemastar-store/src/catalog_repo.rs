use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use tracing::debug;
use cinemastar_catalog::{
    BookOutcome, CatalogError, CatalogResult, CatalogStore, Cinema, Movie, Seat, Session,
};

/// Postgres-backed catalog. Booking is one conditional `UPDATE`, so the
/// database serializes competing confirmations on the seat row.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CinemaRow {
    id: i64,
    name: String,
    address: String,
}

impl From<CinemaRow> for Cinema {
    fn from(row: CinemaRow) -> Self {
        Cinema { id: row.id, name: row.name, address: row.address }
    }
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    description: Option<String>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie { id: row.id, title: row.title, description: row.description }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    movie_id: i64,
    cinema_id: i64,
    show_date: NaiveDate,
    show_time: NaiveTime,
    grid_rows: i32,
    grid_columns: i32,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            movie_id: row.movie_id,
            cinema_id: row.cinema_id,
            date: row.show_date,
            time: row.show_time,
            rows: row.grid_rows,
            seats_per_row: row.grid_columns,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    session_id: i64,
    row_no: i32,
    seat_no: i32,
    is_booked: bool,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat {
            id: row.id,
            session_id: row.session_id,
            row: row.row_no,
            number: row.seat_no,
            is_booked: row.is_booked,
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, movie_id, cinema_id, show_date, show_time, grid_rows, grid_columns";
const SEAT_COLUMNS: &str = "id, session_id, row_no, seat_no, is_booked";

fn backend(err: sqlx::Error) -> CatalogError {
    CatalogError::Backend(err.to_string())
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_cinemas(&self) -> CatalogResult<Vec<Cinema>> {
        let rows = sqlx::query_as::<_, CinemaRow>(
            "SELECT id, name, address FROM cinemas ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Cinema::from).collect())
    }

    async fn list_movies_at(&self, cinema_id: i64) -> CatalogResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(
            r#"
            SELECT DISTINCT m.id, m.title, m.description
            FROM movies m
            JOIN sessions s ON s.movie_id = m.id
            WHERE s.cinema_id = $1
            ORDER BY m.id
            "#,
        )
        .bind(cinema_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn list_sessions(&self, cinema_id: i64, movie_id: i64) -> CatalogResult<Vec<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE cinema_id = $1 AND movie_id = $2 \
             ORDER BY show_date, show_time, id",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(cinema_id)
            .bind(movie_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn list_seats(&self, session_id: i64) -> CatalogResult<Vec<Seat>> {
        let sql = format!(
            "SELECT {} FROM seats WHERE session_id = $1 ORDER BY row_no, seat_no",
            SEAT_COLUMNS
        );
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Seat::from).collect())
    }

    async fn get_cinema(&self, id: i64) -> CatalogResult<Option<Cinema>> {
        let row = sqlx::query_as::<_, CinemaRow>(
            "SELECT id, name, address FROM cinemas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Cinema::from))
    }

    async fn get_movie(&self, id: i64) -> CatalogResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(
            "SELECT id, title, description FROM movies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Movie::from))
    }

    async fn get_session(&self, id: i64) -> CatalogResult<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Session::from))
    }

    async fn get_seat(&self, seat_id: i64) -> CatalogResult<Option<Seat>> {
        let sql = format!("SELECT {} FROM seats WHERE id = $1", SEAT_COLUMNS);
        let row = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(seat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Seat::from))
    }

    async fn find_seat(
        &self,
        session_id: i64,
        row: i32,
        number: i32,
    ) -> CatalogResult<Option<Seat>> {
        let sql = format!(
            "SELECT {} FROM seats WHERE session_id = $1 AND row_no = $2 AND seat_no = $3",
            SEAT_COLUMNS
        );
        let found = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(session_id)
            .bind(row)
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(found.map(Seat::from))
    }

    async fn try_book_seat(&self, seat_id: i64) -> CatalogResult<BookOutcome> {
        let result = sqlx::query(
            "UPDATE seats SET is_booked = TRUE WHERE id = $1 AND is_booked = FALSE",
        )
        .bind(seat_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            debug!("Seat {} booked", seat_id);
            return Ok(BookOutcome::Booked);
        }

        // Nothing updated: the flag never reverts, so an existing row means booked
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM seats WHERE id = $1)")
            .bind(seat_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok(if exists { BookOutcome::AlreadyBooked } else { BookOutcome::NotFound })
    }
}
