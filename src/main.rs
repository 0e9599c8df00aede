use std::sync::Arc;

use pulse_news::config::Config;
use pulse_news::db::{Database, KeyValueStore};
use pulse_news::news::NewsClient;
use pulse_news::polls::{HttpPollRepository, VoteCoordinator};
use pulse_news::routes::{self, AppState};
use pulse_news::stocks::StockClient;
use pulse_news::store::{SavedArticlesStore, VotedPollsStore};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("PULSE_CONFIG").unwrap_or_else(|_| "pulse.toml".to_string());
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    info!(
        "Loaded configuration from {} ({} categories, {} markets)",
        config_path,
        config.news.categories.len(),
        config.stocks.markets.len()
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:pulse_news.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let kv: Arc<dyn KeyValueStore> = Arc::new(db);
    let timeout = config.request_timeout();

    let saves = Arc::new(SavedArticlesStore::new(kv.clone()));
    let voted = Arc::new(VotedPollsStore::new(kv));
    let polls = Arc::new(HttpPollRepository::new(&config.polls, timeout)?);
    let votes = Arc::new(VoteCoordinator::new(polls, voted.clone(), timeout));

    let state = Arc::new(AppState {
        saves,
        voted,
        votes,
        news: Arc::new(NewsClient::new(&config.news, timeout)?),
        stocks: Arc::new(StockClient::new(&config.stocks, timeout)?),
    });

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
