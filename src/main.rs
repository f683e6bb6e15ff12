use anyhow::{anyhow, Context, Result};
use apod_reader::app::{failure_message, App, AppEvent};
use apod_reader::config::Config;
use apod_reader::feed::{FeedClient, FetchRequest, FetchResult, HttpTransport};
use apod_reader::ui;
use apod_reader::util::validate_base_url;
use clap::Parser;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Get the config directory path (~/.config/apod-reader/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("apod-reader"))
}

#[derive(Parser, Debug)]
#[command(
    name = "apod-reader",
    about = "Browse NASA's Astronomy Picture of the Day in the terminal"
)]
struct Args {
    /// First day to fetch (YYYY-MM-DD); defaults to six days ago
    #[arg(long, value_name = "DATE")]
    date: Option<String>,

    /// Config file (default: ~/.config/apod-reader/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the API endpoint
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Print the feed as JSON instead of starting the TUI
    #[arg(long)]
    json: bool,
}

/// Logs go to stderr in JSON mode and to a file under the config dir
/// otherwise, so they never draw over the TUI.
fn init_tracing(json_mode: bool, config_dir: &std::path::Path) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();

    if json_mode {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    let log_path = config_dir.join("apod-reader.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    init_tracing(args.json, &config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;
    tracing::debug!(config = ?config, "Effective configuration");

    let base_url = match &args.base_url {
        Some(url) => validate_base_url(url).context("Invalid --base-url")?,
        None => config.base_url()?,
    };

    let transport = HttpTransport::new(base_url, config.timeout())
        .context("Failed to build HTTP client")?;
    let client = FeedClient::new(transport, config.retry_policy());

    let date = args
        .date
        .clone()
        .unwrap_or_else(|| config.start_date_or(chrono::Utc::now().date_naive()));
    let request = FetchRequest::new(config.api_key().expose_secret(), date);

    if args.json {
        return print_json(&client, &request).await;
    }

    let mut app = App::new(client, request);
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::run(&mut app, event_tx, event_rx).await?;
    Ok(())
}

async fn print_json(client: &FeedClient, request: &FetchRequest) -> Result<()> {
    let json = feed_json(client.fetch_feed(request).await)?;
    println!("{json}");
    Ok(())
}

/// Pretty JSON for a successful fetch. A failure becomes an error so `main`
/// returns it and the process exits non-zero after normal cleanup.
fn feed_json(result: FetchResult) -> Result<String> {
    match result {
        FetchResult::Success(page) => {
            if page.skipped > 0 {
                eprintln!("Warning: {} unreadable items skipped", page.skipped);
            }
            serde_json::to_string_pretty(&page.items).context("Failed to serialize feed items")
        }
        FetchResult::Failure { kind, message } => {
            Err(anyhow!("{} ({message})", failure_message(kind)))
        }
    }
}
