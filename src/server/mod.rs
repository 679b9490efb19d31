//! HTTP API over the article store.
//!
//! Serves the leaderboard, stats, per-article history, and search, plus a
//! refresh trigger that runs the ingest pipeline in the background.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::pipeline::RefreshCoordinator;
use crate::repository::{ArticleRepository, AsyncSqlitePool};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub articles: Arc<ArticleRepository>,
    pub settings: Arc<Settings>,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let pool = AsyncSqlitePool::from_path(&settings.database_path());
        Self {
            articles: Arc::new(ArticleRepository::new(pool)),
            settings: Arc::new(settings),
            coordinator: Arc::new(RefreshCoordinator::new()),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("serving at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
