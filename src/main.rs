use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkshelf::{
    config::Config,
    database::Database,
    favicon::FaviconPipeline,
    models::NewBookmark,
    repositories::{BookmarkRepository, SqliteBookmarkRepository},
    web::{AppState, WebServer, cancel_on_signal},
};

#[derive(Parser)]
#[command(name = "linkshelf")]
#[command(version)]
#[command(about = "A self-hosted bookmark manager with background favicon caching")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL", global = true)]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve(ServeArgs),
    /// Resolve favicons for every bookmark once and print the report
    Refresh,
    /// Add a bookmark
    Add {
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        tags: String,
        /// Known favicon URL or data URI; skips discovery
        #[arg(long)]
        favicon_url: Option<String>,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("linkshelf={},tower_http=trace", cli.log_level)
    } else {
        format!("linkshelf={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    let repository: Arc<dyn BookmarkRepository> =
        Arc::new(SqliteBookmarkRepository::new(database.pool()));

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(config, repository, args).await,
        Command::Refresh => refresh(&config, repository).await,
        Command::Add {
            url,
            title,
            tags,
            favicon_url,
        } => {
            let id = repository
                .insert_one(&NewBookmark {
                    url: url.clone(),
                    title,
                    tags,
                    desc: String::new(),
                    favicon_url,
                })
                .await?;
            println!("Added bookmark {} ({})", id, url);
            Ok(())
        }
    }
}

async fn serve(
    mut config: Config,
    repository: Arc<dyn BookmarkRepository>,
    args: ServeArgs,
) -> Result<()> {
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    info!("Starting linkshelf v{}", env!("CARGO_PKG_VERSION"));
    info!("Using database: {}", config.database.url);

    let pipeline = FaviconPipeline::from_config(&config, repository.clone())?;
    pipeline.fetcher().storage().ensure_dir().await?;
    info!(
        "Caching favicons in {} (served at {})",
        pipeline.fetcher().storage().dir().display(),
        config.favicon.cache_url_prefix
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let state = AppState::new(config, repository, pipeline, shutdown.clone());
    WebServer::new(state).serve_with_cancellation(shutdown).await
}

async fn refresh(config: &Config, repository: Arc<dyn BookmarkRepository>) -> Result<()> {
    let pipeline = FaviconPipeline::from_config(config, repository.clone())?;
    let mut bookmarks = repository.all().await?;
    info!("Refreshing favicons for {} bookmarks", bookmarks.len());

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    let report = pipeline.run_with_cancellation(&mut bookmarks, token.clone()).await;
    token.cancel();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
