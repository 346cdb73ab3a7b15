//! FormPulse - live survey analytics over long-poll
//!
//! Serves a forms API whose analytics endpoint can be long-polled: a
//! request blocks until a response fresher than the caller's baseline
//! arrives, or a wait ceiling elapses.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bind failure, unreadable data file, unknown form, etc.)

mod analysis;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod realtime;
mod report;
mod server;
mod store;
mod validation;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE};
use realtime::Hub;
use std::path::Path;
use std::sync::Arc;
use store::MemoryStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("FormPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .formpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the bind address, long-poll ceiling, and data file.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Command::Serve { .. } => serve(config).await,
        Command::Watch {
            form,
            since,
            max_updates,
            ..
        } => {
            let options = client::WatchOptions {
                server_url: config.client.server_url.clone(),
                form_id: form,
                since,
                max_updates,
                request_timeout_secs: config.client.request_timeout_secs,
                show_progress: !args.quiet,
            };
            println!("👀 Watching form {} on {}", options.form_id, options.server_url);
            let updates = client::WatchClient::new(options)?.run().await?;
            println!("\n✅ Received {} update(s).", updates);
            Ok(())
        }
        Command::Summarize {
            data_file,
            form,
            format,
            output,
        } => summarize(&data_file, &form, format, output.as_deref()).await,
        Command::InitConfig => handle_init_config(),
    }
}

/// Run the HTTP server until interrupted.
async fn serve(config: Config) -> Result<()> {
    config.server.validate().context("Invalid [server] configuration")?;

    if config.server.longpoll_ceiling() > realtime::DEFAULT_CEILING {
        warn!(
            "Long-poll ceiling of {}s exceeds the usual {}s; proxies may cut requests short",
            config.server.longpoll_ceiling_secs,
            realtime::DEFAULT_CEILING.as_secs()
        );
    }

    let hub = Hub::new();
    let store = match &config.store.data_file {
        Some(path) => MemoryStore::open(path, hub.clone())
            .await
            .with_context(|| format!("Failed to open data file {}", path.display()))?,
        None => {
            info!("No data file configured, forms are kept in memory only");
            MemoryStore::new(hub.clone())
        }
    };

    let state = Arc::new(server::AppState::new(
        Arc::new(store),
        hub,
        config.server.longpoll_ceiling(),
    ));

    println!("🚀 FormPulse listening on http://{}", config.server.bind);
    server::Server::new(config.server, state).run().await?;
    println!("\n👋 Server stopped.");
    Ok(())
}

/// Aggregate a stored form offline and write the chosen report.
async fn summarize(
    data_file: &Path,
    form_id: &str,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let data = store::load_data(data_file)
        .await
        .with_context(|| format!("Failed to read data file {}", data_file.display()))?;

    let form = data
        .forms
        .get(form_id)
        .with_context(|| format!("Form not found in data file: {}", form_id))?;
    let records = data.responses.get(form_id).cloned().unwrap_or_default();

    let snapshot = analysis::compute(form, &records);
    let content = match format {
        OutputFormat::Markdown => report::generate_markdown_report(form, &snapshot),
        OutputFormat::Json => report::generate_json_report(&snapshot)?,
        OutputFormat::Csv => report::responses_to_csv(form, &records)?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "✅ Summarized {} response(s). Report saved to: {}",
                snapshot.response_count,
                path.display()
            );
        }
        None => print!("{}", content),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
