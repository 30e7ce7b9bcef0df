//! Application entry point for the `airquality-etl` pipeline.
//!
//! Startup sequence shared by every command:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the SQLite store and creating the schema if it does not exist
//!
//! Commands:
//! - `run` (default): one Extract → Transform → Load pass; exits non-zero on failure
//! - `serve`: seed an empty store with demo data, then serve the read API
//! - `seed`: load the demo data file into an empty store
//! - `stats`: print store-wide totals
//!
//! # Environment Variables
//! See [`airquality_etl::config::load_from_env`] for the full list.
//! - `AQ_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `AQ_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr, path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use airquality_etl::{config, db, routes, schema, seed, Config, Extractor, Loader, Pipeline};

// ---

/// Hourly air-quality ETL for European cities
#[derive(Debug, Parser)]
#[command(name = "airquality-etl", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the pipeline once (default)
    Run(RunArgs),
    /// Serve the read API for the dashboard
    Serve,
    /// Load demo data into an empty store
    Seed {
        /// Demo data file (defaults to DEMO_DATA_PATH)
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Print store-wide totals
    Stats,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Country codes to extract, comma-separated (defaults to PIPELINE_COUNTRIES)
    #[arg(long, value_delimiter = ',')]
    countries: Vec<String>,

    /// Result-count hint for the extractor (defaults to PIPELINE_LIMIT)
    #[arg(long)]
    limit: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = db::connect(&cfg.db_url, cfg.db_pool_max).await?;
    let status = schema::create_schema(&pool).await?;
    tracing::info!("Database ready ({:?}): {}", status, cfg.db_url);

    let loader = Loader::new(pool.clone());

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run_pipeline(&cfg, loader, args).await,
        Command::Serve => serve(&cfg, loader).await,
        Command::Seed { file } => {
            let path = file.unwrap_or_else(|| cfg.demo_data_path.clone());
            let outcome = seed::load_demo_data(&loader, &path).await?;
            tracing::info!("Seed outcome: {:?}", outcome);
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            let stats = loader.get_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_pipeline(cfg: &Config, loader: Loader, args: RunArgs) -> Result<ExitCode> {
    // ---
    let countries = if args.countries.is_empty() {
        cfg.countries.clone()
    } else {
        config::parse_countries(&args.countries.join(","))
    };
    let limit = args.limit.unwrap_or(cfg.limit);

    let pipeline = Pipeline::new(Extractor::new(cfg)?, loader);
    let report = pipeline.run(&countries, limit).await;

    if report.succeeded() {
        tracing::info!("Pipeline completed successfully");
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(
            "Pipeline failed at {:?}: {}",
            report.failed_at,
            report.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn serve(cfg: &Config, loader: Loader) -> Result<ExitCode> {
    // ---
    if let Err(e) = seed::load_demo_data(&loader, &cfg.demo_data_path).await {
        tracing::warn!("Demo data not loaded: {:#}", e);
    }

    let app = routes::router(loader.pool().clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(ExitCode::SUCCESS)
}

// ---

/// Install the global subscriber. Call once, before anything logs.
///
/// `RUST_LOG` takes precedence over `AQ_LOG_LEVEL`. `AQ_SPAN_EVENTS` selects
/// span events (`full`, `enter_exit`, or close-only by default) and
/// `FORCE_COLOR` overrides TTY detection for ANSI output.
fn init_tracing() {
    // ---
    let span_events = span_events(env::var("AQ_SPAN_EVENTS").ok().as_deref());

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = env::var("AQ_LOG_LEVEL").ok();
        EnvFilter::new(default_directives(level.as_deref()))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

fn span_events(mode: Option<&str>) -> FmtSpan {
    // ---
    match mode {
        Some("full") => FmtSpan::FULL,
        Some("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    }
}

/// Filter directives for an `AQ_LOG_LEVEL` value. Unknown levels mean `info`;
/// per-statement sqlx logging stays at `warn` either way.
fn default_directives(level: Option<&str>) -> String {
    // ---
    let level = level
        .and_then(|l| l.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    format!("{},sqlx::query=warn", level).to_lowercase()
}
