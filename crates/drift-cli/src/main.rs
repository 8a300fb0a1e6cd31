//! drift: end-to-end encrypted file sharing CLI
//!
//! Commands:
//!   share <file>         - encrypt, upload, print the share link
//!   fetch <link|token>   - download and decrypt
//!   info <link|token>    - show expiry and remaining downloads
//!   keygen               - print a fresh 256-bit key as hex
//!   config show          - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use drift_client::{
    ApiClient, DownloadSession, ProgressEvent, ProgressFn, RetrievalOrchestrator, ShareLink,
    UploadOrchestrator, UploadRequest, UploadSession,
};
use drift_core::config::DriftConfig;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "drift",
    version,
    about = "Share files end-to-end encrypted",
    long_about = "drift: encrypt locally, upload ciphertext, share a link that carries the key"
)]
struct Cli {
    /// Path to drift.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "DRIFT_CONFIG",
        default_value = "~/.config/drift/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "DRIFT_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "DRIFT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file, upload it, and print a share link
    Share {
        /// Local file to share
        file: PathBuf,
        /// Hours until the share expires (default: [upload] expiration_hours)
        #[arg(long)]
        expires: Option<u32>,
        /// Number of downloads allowed (default: [upload] download_limit)
        #[arg(long)]
        downloads: Option<u32>,
        /// Always upload in a single request
        #[arg(long)]
        single: bool,
    },

    /// Download and decrypt a shared file
    ///
    /// Accepts a share link (the key is taken from its `key` parameter), an
    /// API download URL, or a bare token together with --key.
    Fetch {
        /// Share link, download URL, or token
        link: String,
        /// Hex key (required when the link carries none)
        #[arg(long, short = 'k', env = "DRIFT_KEY")]
        key: Option<String>,
        /// Output path (default: server-reported filename in the current dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show expiry and remaining downloads without downloading
    Info {
        /// Share link, download URL, or token
        link: String,
    },

    /// Print a freshly generated key as hex
    Keygen,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = DriftConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);
    debug!(config = %config_path.display(), "drift starting");

    match cli.command {
        Commands::Share {
            file,
            expires,
            downloads,
            single,
        } => cmd_share(&config, &file, expires, downloads, single).await,
        Commands::Fetch { link, key, output } => {
            cmd_fetch(&config, &link, key.as_deref(), output.as_deref()).await
        }
        Commands::Info { link } => cmd_info(&config, &link).await,
        Commands::Keygen => cmd_keygen(),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the link and file contents; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

fn api_client(config: &DriftConfig) -> Result<ApiClient> {
    ApiClient::from_config(&config.server).context("building api client")
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, cancelling");
            token.cancel();
        }
    });
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |event| match event {
        ProgressEvent::Advance { percent, message } => {
            pb.set_position(u64::from(percent));
            pb.set_message(message);
        }
        ProgressEvent::Reset => pb.reset(),
    })
}

// ── `drift share` ─────────────────────────────────────────────────────────────

async fn cmd_share(
    config: &DriftConfig,
    file: &Path,
    expires: Option<u32>,
    downloads: Option<u32>,
    single: bool,
) -> Result<()> {
    let meta = tokio::fs::metadata(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    if !meta.is_file() {
        anyhow::bail!("not a regular file: {}", file.display());
    }
    drift_chunks::check_size(meta.len(), config.upload.max_file_size)?;

    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());

    let mut request = UploadRequest::new(file_name, data).with_config(&config.upload);
    if let Some(hours) = expires {
        request = request.expiration_hours(hours);
    }
    if let Some(limit) = downloads {
        request = request.download_limit(limit);
    }
    if single {
        request = request.multipart(false);
    }

    let orchestrator = UploadOrchestrator::new(api_client(config)?)
        .with_progress_tick(Duration::from_millis(config.upload.progress_tick_ms));

    let pb = make_progress_bar("share");
    let mut session = UploadSession::new().with_progress(progress_callback(&pb));
    cancel_on_ctrl_c(session.cancel_token());

    let share = match orchestrator.upload(&mut session, request).await {
        Ok(share) => share,
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e).with_context(|| format!("sharing {}", file.display()));
        }
    };
    pb.finish_with_message("done");

    println!();
    println!("  file:      {} ({})", file.display(), fmt_bytes(meta.len()));
    println!("  expires:   {}", share.expires_at);
    println!("  downloads: {}", share.download_limit);
    println!();
    println!("{}", share.link(&config.server.share_url));
    Ok(())
}

// ── `drift fetch` ─────────────────────────────────────────────────────────────

async fn cmd_fetch(
    config: &DriftConfig,
    link: &str,
    key: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let parsed = ShareLink::parse(link)?;
    let key_hex = key
        .map(str::to_string)
        .or(parsed.key_hex)
        .context("no key: pass --key or use a share link with a key parameter")?;
    // fail on a malformed key before spending a download
    drift_crypto::import_hex(&key_hex)?;

    let orchestrator = RetrievalOrchestrator::new(api_client(config)?);

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => output_path(&orchestrator.suggested_file_name(&parsed.token).await),
    };
    if output.exists() {
        anyhow::bail!("refusing to overwrite {}", output.display());
    }

    let pb = make_progress_bar("fetch");
    let mut session = DownloadSession::new().with_progress(progress_callback(&pb));
    cancel_on_ctrl_c(session.cancel_token());

    let plaintext = match orchestrator
        .retrieve_and_decrypt(&mut session, &parsed.token, &key_hex)
        .await
    {
        Ok(plaintext) => plaintext,
        Err(e) => {
            pb.abandon_with_message("failed");
            if e.is_auth_failure() {
                anyhow::bail!("{e}: check that the link or --key is complete");
            }
            return Err(e.into());
        }
    };
    pb.finish_with_message("done");

    tokio::fs::write(&output, &plaintext)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "  saved: {} ({})",
        output.display(),
        fmt_bytes(plaintext.len() as u64)
    );
    Ok(())
}

/// Keep only the final component of a server-supplied name.
fn output_path(suggested: &str) -> PathBuf {
    Path::new(suggested)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(drift_client::DEFAULT_FILE_NAME))
}

// ── `drift info` ──────────────────────────────────────────────────────────────

async fn cmd_info(config: &DriftConfig, link: &str) -> Result<()> {
    let orchestrator = RetrievalOrchestrator::new(api_client(config)?);
    let info = orchestrator.info(link).await?;

    println!("Share {}", info.id);
    if let Some(name) = &info.filename {
        println!("  filename:  {name}");
    }
    println!("  created:   {}", info.created_at);
    println!("  expires:   {}", info.expiration_time);
    println!(
        "  downloads: {}/{} ({} remaining)",
        info.download_count,
        info.download_limit,
        info.remaining_downloads()
    );
    Ok(())
}

// ── `drift keygen` ────────────────────────────────────────────────────────────

fn cmd_keygen() -> Result<()> {
    let key = drift_crypto::generate_key();
    println!("{}", drift_crypto::export_hex(&key));
    Ok(())
}

// ── `drift config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &DriftConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
