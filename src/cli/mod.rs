//! Command line interface.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, truncate_str};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{load_settings, Settings, DATA_DIR_ENV};
use crate::fetch::{cookies, HttpFeedSource};
use crate::pipeline;
use crate::repository::{migrations, ArticleRepository, AsyncSqlitePool, SortField};
use crate::server;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Article engagement tracking and leaderboard service")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run one fetch/ingest cycle
    Fetch,

    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show store totals and session state
    Status,

    /// Print the current leaderboard
    Leaderboard {
        /// Number of articles to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
        /// Sort field: engagement_score, likes_count or comments_count
        #[arg(short, long, default_value = "engagement_score")]
        sort: String,
        /// Author to exclude from the ranking
        #[arg(long)]
        exclude_author: Option<String>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => init(&settings).await,
        Commands::Fetch => fetch(&settings).await,
        Commands::Serve { host, port } => serve(settings, host, port).await,
        Commands::Status => status(&settings).await,
        Commands::Leaderboard {
            limit,
            sort,
            exclude_author,
        } => leaderboard(&settings, limit, &sort, exclude_author).await,
    }
}

fn open_repository(settings: &Settings) -> anyhow::Result<ArticleRepository> {
    let db_path = settings.database_path();
    if !db_path.exists() {
        anyhow::bail!(
            "no database at {} (run `pulse init` first)",
            db_path.display()
        );
    }
    Ok(ArticleRepository::new(AsyncSqlitePool::from_path(&db_path)))
}

async fn init(settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("creating data directory {}", settings.data_dir.display()))?;
    migrations::run_migrations(&settings.database_url()).await?;

    println!(
        "{} initialized {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    Ok(())
}

async fn fetch(settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    migrations::run_migrations(&settings.database_url()).await?;

    let repo = ArticleRepository::new(AsyncSqlitePool::from_path(&settings.database_path()));
    let source = HttpFeedSource::new(&settings.config.feed, &settings.cookie_path())?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(format!(
        "Fetching articles tagged {}...",
        settings.config.feed.tag_name
    ));
    pb.enable_steady_tick(Duration::from_millis(120));

    let report = pipeline::run_ingest(settings, &repo, &source).await?;
    pb.finish_and_clear();

    println!(
        "{} {} pages fetched, {} unique records ({} duplicates dropped)",
        style("✓").green(),
        report.pages_fetched,
        report.fetched,
        report.duplicates_skipped
    );
    println!(
        "  stored {} articles: {} new, {} snapshots, {} skipped as malformed",
        report.stored,
        report.created,
        report.snapshotted,
        report.parse_skipped + report.missing_id as usize
    );
    if let Some(failure) = &report.fetch_failure {
        println!("{} fetch ended early: {}", style("!").yellow(), failure);
    }
    Ok(())
}

async fn serve(settings: Settings, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    migrations::run_migrations(&settings.database_url()).await?;

    let host = host.unwrap_or_else(|| settings.config.server.host.clone());
    let port = port.unwrap_or(settings.config.server.port);
    server::serve(settings, &host, port).await
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let repo = open_repository(settings)?;
    let stats = repo.stats().await?;

    println!("{}", style("articlepulse status").bold());
    println!("  data dir:  {}", settings.data_dir.display());
    println!("  articles:  {}", stats.total_articles);
    println!("  likes:     {}", stats.total_likes);
    println!("  comments:  {}", stats.total_comments);
    match cookies::cookie_count(&settings.cookie_path()) {
        Ok(count) => println!("  cookies:   {}", count),
        Err(e) => println!("  cookies:   {}", style(e.to_string()).yellow()),
    }
    Ok(())
}

async fn leaderboard(
    settings: &Settings,
    limit: i64,
    sort: &str,
    exclude_author: Option<String>,
) -> anyhow::Result<()> {
    let sort =
        SortField::from_str(sort).with_context(|| format!("unknown sort field: {}", sort))?;
    let repo = open_repository(settings)?;

    let exclude = exclude_author
        .or_else(|| settings.config.leaderboard.exclude_author.clone())
        .filter(|author| !author.is_empty());

    let articles = repo.leaderboard(limit, sort, exclude.as_deref()).await?;
    if articles.is_empty() {
        println!("no articles stored yet (run `pulse fetch`)");
        return Ok(());
    }

    for (rank, article) in articles.iter().enumerate() {
        println!(
            "{:>3}. {:<52} {:>8.1}  {:>4} likes {:>4} comments  {}",
            rank + 1,
            truncate_str(&article.title, 52, "…"),
            article.engagement_score,
            article.likes_count,
            article.comments_count,
            style(&article.author_name).dim()
        );
    }
    Ok(())
}
