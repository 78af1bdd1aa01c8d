//! CLI entry point for the subway arrivals engine.
//!
//! Provides subcommands for answering an arrivals request against the
//! configured feeds and for surveying the shape of a single feed.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use subway_arrivals::{
    config::{FeedConfig, api_key_from_env},
    engine::Engine,
    fetch::{BasicClient, HttpClient, auth::ApiKey, auth::DEFAULT_API_KEY_HEADER, load_bytes},
    output::{append_record, print_json, write_json},
    parser::parse_feed,
    request::{ArrivalsRequest, RequestParams},
    sources::fetch_sources,
    station_index::StationIndex,
    stats::FeedStats,
};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "subway_arrivals")]
#[command(about = "Upcoming subway arrivals from GTFS-RT feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print upcoming arrivals for stations or stop ids as JSON
    Arrivals {
        /// Comma-separated station names
        #[arg(long)]
        station: Option<String>,

        /// Comma-separated stop ids, with or without direction suffix
        #[arg(long)]
        stop_id: Option<String>,

        /// Arrivals kept per station and route (1-10)
        #[arg(long)]
        max_per_route: Option<i64>,

        /// Keep arrivals up to this many seconds in the past (0-3600)
        #[arg(long)]
        window_seconds: Option<i64>,

        /// Comma-separated route allow-list
        #[arg(long)]
        routes: Option<String>,

        /// N, S or both
        #[arg(long)]
        direction: Option<String>,

        /// Answer with a spoken summary instead of structured arrivals
        #[arg(long, default_value_t = false)]
        speech: bool,

        /// Arrivals spoken per station and direction (1-10)
        #[arg(long)]
        speech_limit: Option<i64>,

        /// Direction for the spoken summary; defaults to --direction
        #[arg(long)]
        speech_direction: Option<String>,

        /// Include the diagnostics block
        #[arg(long, default_value_t = false)]
        diagnostics: bool,

        /// Feed source configuration
        #[arg(long, default_value = "feeds.json")]
        feeds: String,

        /// Station index
        #[arg(long, default_value = "stations.json")]
        index: String,
    },
    /// Survey the time fields of one GTFS-RT feed from a file or URL
    Inspect {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// CSV file to append results to
        #[arg(short, long, default_value = "diagnostics.csv")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/subway_arrivals.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("subway_arrivals.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Arrivals {
            station,
            stop_id,
            max_per_route,
            window_seconds,
            routes,
            direction,
            speech,
            speech_limit,
            speech_direction,
            diagnostics,
            feeds,
            index,
        } => {
            let params = RequestParams {
                station,
                stop_id,
                max_per_route,
                window_seconds,
                routes,
                direction,
                speech,
                speech_limit,
                speech_direction,
                diagnostics,
            };
            arrivals(&params, &feeds, &index).await?;
        }
        Commands::Inspect { source, output } => {
            inspect(&source, &output).await?;
        }
    }

    Ok(())
}

/// Wraps the plain client with API key injection when a key is configured.
fn build_client(api_key_header: &str) -> Result<Box<dyn HttpClient>> {
    let basic = BasicClient::new()?;
    match api_key_from_env() {
        Some(key) => {
            info!(header = api_key_header, "Sending API key with feed requests");
            Ok(Box::new(ApiKey::new(basic, api_key_header, &key)?))
        }
        None => Ok(Box::new(basic)),
    }
}

/// Answers one arrivals request and prints the JSON response to stdout.
#[tracing::instrument(skip(params))]
async fn arrivals(params: &RequestParams, feeds_path: &str, index_path: &str) -> Result<()> {
    let request = ArrivalsRequest::from_params(params)?;
    let config = FeedConfig::load(feeds_path)?;
    let index = StationIndex::load(index_path)?;
    info!(stations = index.len(), feeds = config.feeds.len(), "Configuration loaded");

    let engine = Engine::new(&index, config.policy);
    let resolution = engine.resolve(&request)?;

    let selected = config.select(request.routes.as_ref());
    info!(selected = selected.len(), "Fetching feed sources");

    let client = build_client(&config.api_key_header)?;
    let outcomes = fetch_sources(client.as_ref(), &selected).await;

    let response = engine.aggregate(&request, &resolution, &outcomes, Utc::now().timestamp());
    write_json(std::io::stdout().lock(), &response)?;
    Ok(())
}

/// Surveys one feed and appends the result to a CSV file.
#[tracing::instrument(fields(source = %source))]
async fn inspect(source: &str, output: &str) -> Result<()> {
    let client = build_client(DEFAULT_API_KEY_HEADER)?;

    let stats = match load_bytes(client.as_ref(), source).await {
        Ok(bytes) => match parse_feed(&bytes) {
            Ok(feed) => FeedStats::from_feed(&feed),
            Err(e) => {
                error!(error = %e, "Feed parse failed");
                FeedStats::from_error("parse_error", &e.to_string())
            }
        },
        Err(e) => {
            error!(error = %e, "Feed fetch failed");
            FeedStats::from_error("fetch_error", &format!("{e:#}"))
        }
    }
    .with_feed_id(source);

    print_json(&stats)?;
    info!(timed_pct = stats.timed_pct(), "Feed surveyed");
    append_record(output, &stats)?;
    Ok(())
}
