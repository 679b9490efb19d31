//! articlepulse - article engagement tracking and leaderboard service.
//!
//! Polls a cursor-paginated content feed, records engagement metrics with
//! historical snapshots, and serves ranked leaderboards over HTTP.

mod cli;
mod config;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod repository;
mod schema;
mod server;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "pulse=info"
    } else {
        "pulse=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
