//! `logtail-tui`: follow log channels in a full-screen terminal UI.
//!
//! Channel picker on the left, scrolling log on the right, connection
//! status along the bottom. Server and profile come from the shared
//! logtail config file, with flag overrides.
//!
//! Logs are written to a file (default `/tmp/logtail-tui.log`) to avoid
//! corrupting the terminal UI.

mod action;
mod app;
mod bridge;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use logtail_config::Profile;
use logtail_core::ClientConfig;

use crate::app::App;

/// Terminal UI for following logtail channels.
#[derive(Parser, Debug)]
#[command(name = "logtail-tui", version, about)]
struct Cli {
    /// Server profile to use
    #[arg(short = 'p', long, env = "LOGTAIL_PROFILE")]
    profile: Option<String>,

    /// Server host (overrides profile)
    #[arg(short = 'H', long, env = "LOGTAIL_HOST")]
    host: Option<String>,

    /// Server port (overrides profile)
    #[arg(short = 'P', long, env = "LOGTAIL_PORT")]
    port: Option<u16>,

    /// URL scheme, `wss` or `ws` (overrides profile)
    #[arg(long, env = "LOGTAIL_SCHEME")]
    scheme: Option<String>,

    /// Channels to follow (defaults to the profile's channel list)
    channels: Vec<String>,

    /// Log lines kept for scrollback
    #[arg(long, default_value_t = widgets::log_view::DEFAULT_CAPACITY)]
    scrollback: usize,

    /// Log file path
    #[arg(long, default_value = "/tmp/logtail-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. Nothing may log to stdout/stderr while the
/// TUI owns the terminal. Hold the returned guard until exit so logs flush.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "logtail_tui={log_level},logtail_core={log_level},logtail_api={log_level}"
        ))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("logtail-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    guard
}

/// Resolve the server from the config file plus flag overrides.
fn build_client_config(cli: &Cli) -> Result<ClientConfig> {
    let cfg = logtail_config::load_config()?;
    let name = cfg.active_profile_name(cli.profile.as_deref());

    let mut profile = match (cfg.profiles.get(&name), cli.host.as_deref()) {
        (Some(profile), _) => profile.clone(),
        (None, Some(host)) => Profile::for_host(host),
        (None, None) => {
            return Err(eyre!(
                "no profile '{name}' in {} and no --host given; run `logtail config init`",
                logtail_config::config_path().display()
            ));
        }
    };
    if let Some(ref host) = cli.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        profile.port = port;
    }
    if let Some(ref scheme) = cli.scheme {
        profile.scheme.clone_from(scheme);
    }
    if !cli.channels.is_empty() {
        profile.channels.clone_from(&cli.channels);
    }

    let retry = cfg.retry_policy(&profile);
    Ok(logtail_config::profile_to_client_config(&profile, retry)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    let _log_guard = setup_tracing(&cli);

    // Resolve before touching the terminal so errors print normally.
    let config = build_client_config(&cli)?;
    info!(url = %config.url, channels = config.channels.len(), "starting logtail-tui");

    let mut app = App::new(config, cli.scrollback);
    app.run().await?;

    Ok(())
}
