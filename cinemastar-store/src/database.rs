use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use cinemastar_catalog::CatalogSeed;
use crate::StoreResult;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Load the seed into an empty catalog. An already populated catalog is
    /// left alone so bookings survive restarts.
    pub async fn seed_catalog(&self, seed: &CatalogSeed) -> StoreResult<bool> {
        seed.validate()?;

        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cinemas")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            info!("Catalog already holds {} cinemas, skipping seed", existing);
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        for cinema in &seed.cinemas {
            sqlx::query("INSERT INTO cinemas (id, name, address) VALUES ($1, $2, $3)")
                .bind(cinema.id)
                .bind(&cinema.name)
                .bind(&cinema.address)
                .execute(&mut *tx)
                .await?;
        }

        for movie in &seed.movies {
            sqlx::query("INSERT INTO movies (id, title, description) VALUES ($1, $2, $3)")
                .bind(movie.id)
                .bind(&movie.title)
                .bind(&movie.description)
                .execute(&mut *tx)
                .await?;
        }

        for session in &seed.sessions {
            sqlx::query(
                r#"
                INSERT INTO sessions
                    (id, movie_id, cinema_id, show_date, show_time, grid_rows, grid_columns)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(session.id)
            .bind(session.movie_id)
            .bind(session.cinema_id)
            .bind(session.date)
            .bind(session.time)
            .bind(session.rows)
            .bind(session.seats_per_row)
            .execute(&mut *tx)
            .await?;
        }

        let seats = seed.seat_grid();
        for seat in &seats {
            sqlx::query(
                r#"
                INSERT INTO seats (id, session_id, row_no, seat_no, is_booked)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(seat.id)
            .bind(seat.session_id)
            .bind(seat.row)
            .bind(seat.number)
            .bind(seat.is_booked)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Catalog seeded: {} cinemas, {} movies, {} sessions, {} seats",
            seed.cinemas.len(),
            seed.movies.len(),
            seed.sessions.len(),
            seats.len()
        );
        Ok(true)
    }
}
