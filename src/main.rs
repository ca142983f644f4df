//! restlittle - Systemd user daemon that reminds you to rest.
//!
//! Tracks busy and idle time from input activity and warns when you have
//! been busy for too long without a break.

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use restlittle::config::Config;
use restlittle::idle;
use restlittle::idle::IdleStatusProvider;
use restlittle::idle::InputBackend;
use restlittle::idle::LogindInputObserver;
use restlittle::idle::X11InputObserver;
use restlittle::monitor::RestingMonitor;
use restlittle::notify::NotificationClient;
use restlittle::presenter::Presenter;
use restlittle::signal::InteractionSource;
use restlittle::surface::ConsoleSurface;
use restlittle::surface::DesktopSurface;
use restlittle::surface::StatusSurface;
use restlittle::suspend;
use restlittle::suspend::ResumeTracker;
use std::path::PathBuf;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Rest reminder daemon.
///
/// Tracks busy and idle time and warns when you need a break.
#[derive(Parser, Debug)]
#[command(name = "restlittle")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable dry-run mode (log warnings instead of sending notifications).
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print one JSON status line per update to stdout.
    #[arg(long)]
    print_status: bool,

    /// Run in oneshot mode: run a few updates, then exit.
    #[arg(long)]
    oneshot: bool,

    /// Number of updates to run in oneshot mode.
    #[arg(long, default_value = "5")]
    oneshot_count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("restlittle v{} starting", env!("CARGO_PKG_VERSION"));

    for diag in idle::diagnostics() {
        debug!("{}", diag);
    }

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    if args.dry_run {
        config.dry_run = true;
    }

    info!(
        "Configuration loaded (max_busy={}s, resting={}s, dry_run={})",
        config.max_busy_seconds, config.resting_seconds, config.dry_run
    );

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let result = run_daemon(&config, &args, shutdown.clone()).await;

    // Stop background pollers and listeners.
    shutdown.cancel();

    if let Err(ref e) = result {
        error!("{:#}", e);
    }
    result
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("restlittle={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl-C");
                }
                shutdown.cancel();
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }

        shutdown.cancel();
    });
}

/// Wire the signal sources, monitor and surface, then run the presenter.
async fn run_daemon(config: &Config, args: &Args, shutdown: CancellationToken) -> Result<()> {
    let interaction = connect_interaction(config, &shutdown).await?;

    let tracker = ResumeTracker::new();
    if config.suspend_detection {
        suspend::logind::listen(tracker.clone(), shutdown.clone())
            .await
            .context("Failed to start suspend detection (set suspend_detection = false to skip)")?;
    } else {
        info!("Suspend detection disabled");
    }

    let monitor = RestingMonitor::new(config.resting_policy(), interaction, tracker);
    let surface = build_surface(config, args.print_status).await;
    let mut presenter = Presenter::new(monitor, surface, config.warning_interval());

    if args.oneshot {
        info!("Running in oneshot mode, {} updates", args.oneshot_count);
        let reports = presenter
            .run_ticks(args.oneshot_count, config.update_interval())
            .await
            .context("Resting monitor update failed")?;
        if let Some(last) = reports.last() {
            info!(
                "Oneshot mode complete: {} ({})",
                last.status.as_str(),
                last.summary()
            );
        }
        return Ok(());
    }

    info!("Daemon started");

    presenter
        .run(config.update_interval(), shutdown)
        .await
        .context("Resting monitor update failed")?;

    info!("restlittle stopped");
    Ok(())
}

/// Connect the configured input backend.
async fn connect_interaction(
    config: &Config,
    shutdown: &CancellationToken,
) -> Result<Box<dyn InteractionSource + Send>> {
    let backend = config.input_backend.resolve();
    info!("Using {} input backend", backend.as_str());
    if let Some(caveat) = backend.caveat() {
        warn!("{}", caveat);
    }

    match backend {
        InputBackend::X11 => {
            let observer = X11InputObserver::connect().context("Failed to connect to X server")?;
            Ok(Box::new(IdleStatusProvider::new(
                config.time_to_idle(),
                observer,
            )))
        }
        InputBackend::Logind | InputBackend::Auto => {
            let observer = LogindInputObserver::connect()
                .await
                .context("Failed to initialize logind idle monitoring")?;
            observer.start_polling(config.idle_check_interval(), shutdown.clone());
            Ok(Box::new(IdleStatusProvider::new(
                config.time_to_idle(),
                observer,
            )))
        }
    }
}

/// Pick where status and warnings go.
async fn build_surface(config: &Config, print_status: bool) -> Box<dyn StatusSurface> {
    let console = ConsoleSurface::new(print_status);

    if !config.notifications {
        info!("Desktop notifications disabled");
        return Box::new(console);
    }

    match NotificationClient::connect(config.dry_run).await {
        Ok(notifier) => {
            if notifier.is_dry_run() {
                info!("Dry run: rest warnings are logged, not sent");
            }
            Box::new(DesktopSurface::new(console, notifier))
        }
        Err(e) => {
            warn!("Desktop notifications unavailable, warnings go to the log only: {}", e);
            Box::new(console)
        }
    }
}
