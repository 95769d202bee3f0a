//! Sentinel Vision CLI
//!
//! Classifies operator frames from disk, or serves the dashboard backend.

use std::io::{ErrorKind, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sentinel_core::{
    create_router, resolve_api_key, AlertLevel, AppState, CapturedImage, Config,
    CredentialSource, GeminiClient, ImageFormat, Monitor, SentinelError, SessionPhase,
    SessionSnapshot,
};
use sentinel_dashboard::{json::JsonGenerator, Dashboard, TextRenderer};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Sentinel Vision - Operator Drowsiness Monitor
///
/// Sends captured frames to a vision model and reports whether the operator
/// is alert, drowsy or asleep.
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: sentinel.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Vision model to use instead of the configured one
    #[arg(short, long, value_name = "NAME", global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify image files in order, printing the dashboard after each one
    Analyze {
        /// Captured frames (PNG, JPEG or WebP)
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,

        /// Print one JSON document per frame instead of the text panel
        #[arg(long)]
        json: bool,

        /// Do not ring the terminal bell on critical alerts
        #[arg(long)]
        no_sound: bool,
    },

    /// Run the HTTP and WebSocket dashboard backend
    Serve {
        /// Port for the HTTP API server (default: from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if is_fatal(&e) {
                tracing::error!("Stopped before any frame was analyzed");
            }
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Returns `true` for configuration and credential errors.
fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SentinelError>()
        .is_some_and(SentinelError::is_fatal)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    let port = match &args.command {
        Command::Serve { port } => *port,
        Command::Analyze { .. } => None,
    };
    apply_overrides(&mut config, args.model.as_deref(), port);

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    match args.command {
        Command::Analyze {
            images,
            json,
            no_sound,
        } => analyze(&config, &images, json, !no_sound).await,
        Command::Serve { .. } => serve(&config).await,
    }
}

/// Applies command line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut Config, model: Option<&str>, port: Option<u16>) {
    if let Some(model) = model {
        model.clone_into(&mut config.model);
    }
    if let Some(port) = port {
        config.port = port;
    }
}

/// Runs one capture cycle per image within a single session.
///
/// Every file is read before the first inference call, so an unreadable
/// frame stops the run without spending any requests.
async fn analyze(
    config: &Config,
    paths: &[PathBuf],
    json: bool,
    sound: bool,
) -> anyhow::Result<()> {
    let frames = paths
        .iter()
        .map(|path| load_frame(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let monitor = build_monitor(config)?;

    for (index, frame) in frames.into_iter().enumerate() {
        let source = frame
            .source
            .as_deref()
            .map_or_else(String::new, |p| p.display().to_string());
        tracing::info!(frame = index + 1, source = %source, "Analyzing frame");

        let snapshot = match monitor.process_capture(frame).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(source = %source, error = %e, "Frame skipped");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if snapshot.phase == SessionPhase::Error {
            tracing::warn!(source = %source, "Analysis failed, continuing with next frame");
        }

        let dashboard = Dashboard::from_snapshot(&snapshot);
        if json {
            println!("{}", JsonGenerator::new(&dashboard).generate()?);
        } else {
            if index > 0 {
                println!();
            }
            println!("--- {source} ---");
            print!("{}", TextRenderer::new(&dashboard).render());
        }

        sound_alarm(&snapshot, sound, &mut std::io::stderr())?;
    }

    Ok(())
}

/// Rings the terminal bell when the operator is classified as asleep.
///
/// Returns `true` if the bell was rung.
fn sound_alarm(
    snapshot: &SessionSnapshot,
    enabled: bool,
    out: &mut impl Write,
) -> std::io::Result<bool> {
    if !enabled || snapshot.alert_level != Some(AlertLevel::Critical) {
        return Ok(false);
    }

    out.write_all(b"\x07")?;
    out.flush()?;
    Ok(true)
}

/// Serves the dashboard backend until Ctrl+C.
async fn serve(config: &Config) -> anyhow::Result<()> {
    let monitor = build_monitor(config)?;
    let router = create_router(AppState::new(monitor));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid bind address '{}:{}': {e}\n\nSuggestion: Set bindAddress to an IP address such as 127.0.0.1",
                config.bind_address,
                config.port
            )
        })?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind HTTP server to {addr}: {e}\n\nSuggestion: Use --port to pick a free port"
        )
    })?;

    tracing::info!(address = %addr, "HTTP server listening");
    eprintln!("Dashboard backend listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

/// Resolves the API key and builds a monitor backed by the remote model.
fn build_monitor(config: &Config) -> anyhow::Result<Monitor> {
    let (api_key, source) = resolve_api_key(&config.api_key_env, prompt_for_key)?;
    if source == CredentialSource::Prompt {
        tracing::debug!("Using API key entered at the prompt");
    }

    let client = GeminiClient::new(config, api_key)?;
    tracing::info!(endpoint = client.endpoint(), "Inference client ready");

    Ok(Monitor::new(Arc::new(client)))
}

/// Asks for the API key on the terminal without echoing it.
fn prompt_for_key() -> std::io::Result<Option<String>> {
    entered_key(rpassword::prompt_password("Enter API key: "))
}

/// Treats a closed input as no key entered.
fn entered_key(read: std::io::Result<String>) -> std::io::Result<Option<String>> {
    match read {
        Ok(key) => Ok(Some(key)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reads one frame from disk, warning when its extension disagrees with its contents.
fn load_frame(path: &Path) -> anyhow::Result<CapturedImage> {
    let frame = CapturedImage::load(path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read image '{}': {e}\n\nSuggestion: Pass a PNG, JPEG or WebP file",
            path.display()
        )
    })?;

    if let Some(expected) = ImageFormat::from_path(path) {
        if expected != frame.format {
            tracing::warn!(
                path = %path.display(),
                extension = %expected,
                detected = %frame.format,
                "Image extension does not match its contents"
            );
        }
    }

    tracing::debug!(
        path = %path.display(),
        format = %frame.format,
        size = frame.size_bytes(),
        "Image loaded"
    );
    Ok(frame)
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Ok(Config::load_from_file(path)?)
        }
        None => Ok(Config::load()?),
    }
}

/// Prints the loaded configuration to stderr, keeping stdout for results.
fn print_config(config: &Config) {
    eprintln!("Configuration loaded:");
    eprintln!("  Model: {}", config.model);
    eprintln!("  API base URL: {}", config.api_base_url);
    eprintln!("  API key variable: {}", config.api_key_env);
    eprintln!("  Listen address: {}:{}", config.bind_address, config.port);
}
