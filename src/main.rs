//! impact-monitor - channel message impact scoring with a local LLM
//!
//! Ingests channel messages, filters noise, scores the rest in batches
//! through Ollama, persists every result and pushes high-impact items to
//! notification sinks, plus a scheduled daily digest.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, storage, backend setup, etc.)
//!   2 - A forced report could not be delivered to any sink

mod analyzer;
mod backend;
mod cli;
mod config;
mod error;
mod filter;
mod models;
mod monitor;
mod notify;
mod report;
mod storage;
mod transport;
mod trends;

use analyzer::{Analyzer, AnalyzerSettings};
use anyhow::{Context, Result};
use backend::{OllamaBackend, OllamaSettings};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use filter::MessageFilter;
use monitor::{Monitor, MonitorHandle, MonitorSettings};
use notify::Dispatcher;
use report::{DailyReportBuilder, DigestSettings};
use std::sync::Arc;
use storage::Storage;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use transport::JsonLinesSource;
use trends::KeywordRefresher;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("impact-monitor v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Monitor failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to configure the model, sinks, thresholds and schedule.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
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

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Wire every component from configuration.
struct Components {
    config: Config,
    storage: Arc<Storage>,
    filter: Arc<MessageFilter>,
    analyzer: Arc<Analyzer>,
    dispatcher: Arc<Dispatcher>,
}

async fn build_components(args: &Args) -> Result<Components> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);

    for warning in config.validate() {
        warn!("{}", warning);
    }

    let storage = Storage::open(&config.storage.path)
        .await
        .with_context(|| format!("Failed to open storage at {}", config.storage.path.display()))?;
    info!(
        "Storage: {} ({} records)",
        storage.path().display(),
        storage.len()
    );

    let backend = OllamaBackend::new(OllamaSettings::from(&config.model))
        .context("Failed to initialize the Ollama backend")?;
    let analyzer = Analyzer::new(
        Arc::new(backend),
        AnalyzerSettings::from_config(&config.model, &config.report),
    );

    let filter = MessageFilter::new(config.filter.clone());
    let dispatcher = Dispatcher::from_config(&config.notification)
        .context("Failed to build notification sinks")?;

    Ok(Components {
        config,
        storage: Arc::new(storage),
        filter: Arc::new(filter),
        analyzer: Arc::new(analyzer),
        dispatcher: Arc::new(dispatcher),
    })
}

fn daily_report_builder(components: &Components) -> DailyReportBuilder {
    DailyReportBuilder::new(
        components.storage.clone(),
        DigestSettings::from(&components.config.report),
        Some(components.analyzer.clone()),
    )
}

/// Dispatch according to the selected mode. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let components = build_components(&args).await?;

    if args.report {
        return run_report(&args, &components).await;
    }

    let reader = open_input(&args).await?;
    let source = JsonLinesSource::new(reader, components.storage.high_water_marks());
    let (ingest, mut queue) = transport::ingest_channel(components.config.monitor.queue_capacity);

    let refresher = KeywordRefresher::new(components.analyzer.clone(), components.filter.clone());
    let monitor = Arc::new(Monitor::new(
        MonitorSettings::from_config(&components.config),
        components.filter.clone(),
        components.analyzer.clone(),
        components.storage.clone(),
        components.dispatcher.clone(),
        daily_report_builder(&components),
        refresher,
    ));

    let cancel = CancellationToken::new();
    let pump = tokio::spawn(source.pump(ingest, cancel.clone()));

    if args.tick_once {
        let received = monitor.drain_queue(&mut queue).await;
        pump.await
            .context("Input task panicked")?
            .context("Failed to read input")?;

        let report = monitor.tick().await;
        println!("\n📊 Tick Summary:");
        println!("   Messages received: {}", received);
        println!(
            "   Admitted: {} | Filtered: {} | Skipped: {}",
            report.admitted, report.filtered, report.skipped
        );
        println!(
            "   Analyzed: {} | Failed: {} | Stored: {}",
            report.analyzed, report.failed, report.stored
        );
        println!("   Pushed: {}", report.notified);
        return Ok(0);
    }

    let (handle, control) = monitor::control_channel();
    spawn_signal_handlers(cancel.clone(), handle);
    monitor.run(queue, control, cancel.clone()).await;

    cancel.cancel();
    match pump.await {
        Ok(Err(e)) => warn!("Input ended with error: {}", e),
        Err(e) => warn!("Input task ended abnormally: {}", e),
        Ok(Ok(_)) => {}
    }

    Ok(0)
}

/// Handle --report: build and send one digest.
async fn run_report(args: &Args, components: &Components) -> Result<i32> {
    let builder = daily_report_builder(components);
    let date = args
        .date
        .unwrap_or_else(|| builder.previous_day(chrono::Utc::now()));

    println!("📰 Building digest for {}", date);
    let payload = builder.build(date).await;
    let outcomes = components.dispatcher.dispatch(&payload).await;

    if outcomes.is_empty() {
        println!("{}\n\n{}", payload.subject, payload.body);
        return Ok(0);
    }

    let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
    println!("   Delivered to {}/{} sink(s)", delivered, outcomes.len());
    Ok(if delivered == 0 { 2 } else { 0 })
}

async fn open_input(args: &Args) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    match args.input_file() {
        Some(path) => {
            info!("Reading messages from {}", path.display());
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Reading messages from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

/// Cancel on Ctrl-C and SIGTERM. On Unix, SIGUSR1 forces a tick and
/// SIGUSR2 forces the daily report.
fn spawn_signal_handlers(cancel: CancellationToken, handle: MonitorHandle) {
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                ctrl_c.cancel();
            }
            Err(e) => error!("Error setting up signal handler: {}", e),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal");
                cancel.cancel();
            }
            Err(e) => error!("Error setting up SIGTERM handler: {}", e),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut usr1, mut usr2) = match (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::user_defined2()),
        ) {
            (Ok(usr1), Ok(usr2)) => (usr1, usr2),
            _ => {
                warn!("Manual trigger signals unavailable");
                return;
            }
        };

        loop {
            let sent = tokio::select! {
                Some(()) = usr1.recv() => handle.force_tick().await,
                Some(()) = usr2.recv() => handle.force_report(None).await,
                else => break,
            };
            if sent.is_err() {
                break;
            }
        }
    });

    #[cfg(not(unix))]
    drop(handle);
}
