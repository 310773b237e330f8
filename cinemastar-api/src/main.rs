use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use cinemastar_api::{app, worker, AppState};
use cinemastar_booking::{ConversationStore, InMemoryConversationStore};
use cinemastar_catalog::{CatalogSeed, CatalogStore, InMemoryCatalog};
use cinemastar_store::app_config::{CatalogBackend, Config, ConversationBackend};
use cinemastar_store::{DbClient, PgCatalogStore, RedisConversationStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cinemastar_api=debug,cinemastar_booking=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cinemastar on port {}", config.server.port);

    let seed = match &config.catalog.seed_path {
        Some(path) => CatalogSeed::from_json_file(path).context("Failed to load catalog seed")?,
        None => CatalogSeed::default_seed(),
    };

    let catalog: Arc<dyn CatalogStore> = match config.catalog.backend {
        CatalogBackend::Memory => Arc::new(InMemoryCatalog::from_seed(seed)?),
        CatalogBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .context("catalog.backend = \"postgres\" requires a [database] section")?;
            let db = DbClient::new(&db_config.url, db_config.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await?;
            db.seed_catalog(&seed).await?;
            Arc::new(PgCatalogStore::new(db.pool.clone()))
        }
    };

    let ttl_seconds = config.business_rules.conversation_ttl_seconds;
    let conversations: Arc<dyn ConversationStore> = match config.conversations.backend {
        ConversationBackend::Memory => Arc::new(InMemoryConversationStore::new()),
        ConversationBackend::Redis => {
            let redis_config = config
                .redis
                .as_ref()
                .context("conversations.backend = \"redis\" requires a [redis] section")?;
            let store = RedisConversationStore::new(&redis_config.url, ttl_seconds)
                .context("Invalid Redis URL")?;
            Arc::new(store)
        }
    };

    let idle_ttl = chrono::Duration::seconds(ttl_seconds as i64);
    let app_state = AppState::new(catalog, conversations, idle_ttl);

    worker::spawn_idle_sweeper(
        app_state.tracker.clone(),
        tokio::time::Duration::from_secs(config.business_rules.sweep_interval_seconds.max(1)),
    );
    worker::spawn_booking_audit(app_state.engine.subscribe());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;

    Ok(())
}
