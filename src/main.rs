//! covermux - entry point.
//!
//! Loads configuration, sets up logging to console and a rolling file, then
//! runs the requested command.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use covermux::cli::{Args, Commands};
use covermux::config::{Config, LoggingConfig};
use covermux::form::{ConversionBackend, RemoteBackend, SandboxBackend, UploadForm};
use covermux::media::{Transcoder, TranscoderFactory};
use covermux::progress::ProgressReporter;
use covermux::sandbox::{ModuleStatus, ToolModules};
use covermux::server::{self, AppState};
use covermux::upload::InputBlob;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Writing a fresh config must not depend on an existing one parsing
    if let Commands::Init { path, force } = &args.command {
        Config::write_default(path, *force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try config.toml from the current directory first
            if Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env();

    let _guard = setup_logging(&config.logging, args.verbose)?;
    info!(version = env!("CARGO_PKG_VERSION"), "covermux starting");

    match args.command {
        Commands::Serve { bind } => {
            let bind_address = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let transcoder: Arc<dyn Transcoder> = Arc::from(TranscoderFactory::create(config.media.clone()));
            if let Err(e) = transcoder.check_availability().await {
                // Requests will fail with 500 until the binary shows up
                warn!(error = %e, "transcoder is not available");
            }
            let state = Arc::new(AppState::new(&config, transcoder));
            server::serve(&bind_address, state).await?;
        }
        Commands::Convert { media, cover, output_dir, server: server_url } => {
            let mut form = UploadForm::new();
            form.select_media(Some(InputBlob::from_path(&media).await?));
            form.select_cover(Some(InputBlob::from_path(&cover).await?));

            let saved = match server_url {
                Some(url) => {
                    let backend = RemoteBackend::new(&url)?;
                    info!(endpoint = %backend.endpoint(), "converting on server");
                    submit(&mut form, &backend, None, &output_dir).await?
                }
                None => {
                    let report = ToolModules::load(&config.media, &config.scratch_dir()).await;
                    let backend = SandboxBackend::new(Some(report.into_loaded()?));
                    let reporter = ProgressReporter::new();
                    let bar = spawn_progress_bar(&reporter);
                    let saved = submit(&mut form, &backend, Some(&reporter), &output_dir).await;
                    bar.finish_and_clear();
                    saved?
                }
            };
            println!("Saved {}", saved.display());
        }
        Commands::Check => {
            let scratch = config.scratch_dir();
            let report = ToolModules::load(&config.media, &scratch).await;
            println!("{:<12} {:<10} {}", "Module", "Status", "Detail");
            println!("{}", "-".repeat(60));
            for (kind, status) in &report.statuses {
                match status {
                    ModuleStatus::Loaded => println!("{:<12} {:<10}", kind.to_string(), "loaded"),
                    ModuleStatus::Missing(reason) => println!("{:<12} {:<10} {}", kind.to_string(), "missing", reason),
                }
            }
            let transcoder = TranscoderFactory::create(config.media.clone());
            if let Ok(version) = transcoder.version_info().await {
                println!("\n{}", version);
            }
            println!("Scratch directory: {}", scratch.display());
            if !report.all_loaded() {
                anyhow::bail!("some modules are missing");
            }
        }
        // Handled before configuration is loaded
        Commands::Init { .. } => {}
    }

    Ok(())
}

async fn submit(
    form: &mut UploadForm,
    backend: &dyn ConversionBackend,
    progress: Option<&ProgressReporter>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let download = form.submit(backend, progress).await?;
    Ok(download.save_into(output_dir).await?)
}

/// Mirror the reporter on a terminal progress bar
fn spawn_progress_bar(reporter: &ProgressReporter) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut rx = reporter.subscribe();
    let handle = bar.clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let percent = *rx.borrow_and_update();
            handle.set_position(u64::from(percent));
        }
    });
    bar
}

/// Setup logging to both console and file
fn setup_logging(logging: &LoggingConfig, verbose: bool) -> Result<WorkerGuard> {
    let log_dir = match &logging.log_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(".covermux").join("log"),
    };
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard flushes on drop
    let file_appender = rolling::daily(&log_dir, "covermux.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let filter = if verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        match logging.level.parse::<EnvFilter>() {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!(
                    "WARN: log level '{}' is not a valid tracing filter ({}); falling back to 'info'",
                    logging.level, e
                );
                EnvFilter::new("info")
            }
        }
    };

    let console_layer = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - file: {}", log_dir.join("covermux.log").display());

    Ok(guard)
}
