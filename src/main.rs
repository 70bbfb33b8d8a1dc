//! facesprite - Headless PNGTuber overlay driven by face landmarks
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use facesprite::{
    config::Config,
    error::WebError,
    output::{browser::BrowserServer, AvatarEvent, BroadcastSink},
    pipeline::{run_pipeline, FramePipeline, PipelineEvent},
    tracking::{
        mediapipe::{MpReceiver, TrackerControl},
        subprocess::{check_mediapipe_available, wait_restart_delay, MpSubprocess},
    },
    web::WebServer,
    AppState,
};

/// facesprite - 2D avatar overlay driven by face landmarks
#[derive(Parser, Debug)]
#[command(name = "facesprite", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// HTTP server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable HTTP server
    #[arg(long)]
    no_http: bool,

    /// Disable the landmark tracker
    #[arg(long)]
    no_tracker: bool,

    /// UDP port for landmark packets (overrides config)
    #[arg(long)]
    tracker_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", facesprite::NAME, facesprite::VERSION);

    let config = load_config(&args)?;
    let state = setup_and_spawn_services(config).await?;

    shutdown_signal().await;
    info!("Shutdown signal received");
    state.shutdown();

    // Give tasks a moment to clean up
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    info!("facesprite stopped");
    Ok(())
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    if args.no_http {
        config.http.enabled = false;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if args.no_tracker {
        config.mediapipe.enabled = false;
    }
    if let Some(port) = args.tracker_port {
        config.mediapipe.port = port;
    }

    config.validate()?;

    info!(
        "Thresholds: blink < {}, mouth > {}",
        config.tuning.blink_threshold, config.tuning.mouth_threshold
    );
    info!("Landmark tracker: {}", config.mediapipe.enabled);
    info!("HTTP server: {}", config.http.enabled);

    Ok(config)
}

/// Create AppState and spawn the pipeline, tracker and HTTP server
async fn setup_and_spawn_services(config: Config) -> anyhow::Result<Arc<AppState>> {
    let (state, events_rx) = AppState::new(config.clone());

    let sink = BroadcastSink::new(state.event_sender());
    let pipeline = FramePipeline::new(&config, sink);
    let pipeline_state = Arc::clone(&state);
    tokio::spawn(async move {
        let pipeline = run_pipeline(pipeline, events_rx, pipeline_state).await;
        let snapshot = pipeline.snapshot();
        info!(
            "Frame pipeline stopped ({} frames processed, {} skipped)",
            snapshot.frames_processed, snapshot.frames_skipped
        );
    });

    if config.mediapipe.enabled {
        let tracker_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_mediapipe_tracking(tracker_state).await {
                error!("Landmark tracking error: {}", e);
            }
        });

        let preview_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_preview_forwarder(preview_state).await {
                error!("Tracker preview forwarding error: {}", e);
            }
        });
    } else {
        info!("Landmark tracker disabled");
    }

    if config.http.enabled {
        let http_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_http_server(http_state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    Ok(state)
}

async fn run_http_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await;
    let http_config = config.http.clone();
    let avatar_config = config.avatar.clone();
    drop(config);

    let browser_server = BrowserServer::new(state.clone(), &avatar_config);
    let web_server = WebServer::new(state.clone(), &http_config);

    let addr = format!("{}:{}", http_config.host, http_config.port);

    let app = web_server.router().merge(browser_server.router());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WebError::Bind(format!("{}: {}", addr, e)))?;
    info!("HTTP server listening on {} (overlay at /avatar)", addr);

    let mut shutdown_rx = state.subscribe_shutdown();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| WebError::Startup(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn run_mediapipe_tracking(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await;
    let mp_config = config.mediapipe.clone();
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();
    let frames_tx = state.pipeline_sender();

    let mut subprocess = if mp_config.auto_launch {
        if !check_mediapipe_available() {
            warn!("python3 cannot import mediapipe; the tracker will likely fail to start");
        }
        let mut sp = MpSubprocess::new(&mp_config);
        if let Err(e) = sp.start() {
            error!("Failed to auto-launch tracker: {}", e);
        }
        Some(sp)
    } else {
        None
    };

    let mut receiver = MpReceiver::new(&mp_config);
    receiver.start()?;

    info!("Landmark tracking started (port: {})", mp_config.port);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(5)) => {
                // Drain everything pending, one pipeline event per frame
                loop {
                    match receiver.poll() {
                        Ok(Some(delivery)) => {
                            match frames_tx.try_send(PipelineEvent::Frame(delivery)) {
                                Ok(()) => {}
                                Err(TrySendError::Full(_)) => {
                                    debug!("Pipeline busy, dropping frame");
                                }
                                Err(TrySendError::Closed(_)) => {
                                    info!("Frame pipeline gone, stopping tracker");
                                    receiver.stop();
                                    if let Some(ref mut sp) = subprocess {
                                        sp.stop().await;
                                    }
                                    return Ok(());
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Landmark receive error: {}", e);
                            break;
                        }
                    }
                }

                // Check subprocess health and auto-restart if needed
                if let Some(ref mut sp) = subprocess {
                    if !sp.is_running() && mp_config.auto_restart {
                        info!(
                            "Tracker subprocess exited, restarting in {}s",
                            mp_config.restart_delay_secs
                        );
                        let delay = Duration::from_secs(mp_config.restart_delay_secs);
                        if !wait_restart_delay(delay, &mut shutdown_rx).await {
                            info!("Landmark tracking shutting down");
                            break;
                        }
                        if let Err(e) = sp.start() {
                            error!("Failed to restart tracker: {}", e);
                        }
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Landmark tracking shutting down");
                break;
            }
        }
    }

    receiver.stop();
    if let Some(ref mut sp) = subprocess {
        sp.stop().await;
    }

    Ok(())
}

/// Mirror the debug toggle to the tracker's camera preview window
async fn run_preview_forwarder(state: Arc<AppState>) -> anyhow::Result<()> {
    let control = {
        let config = state.config.read().await;
        TrackerControl::new(&config.mediapipe)?
    };

    let mut events = state.subscribe_events();
    let mut shutdown_rx = state.subscribe_shutdown();

    loop {
        tokio::select! {
            event = events.recv() => {
                let visible = match event {
                    Ok(AvatarEvent::Debug { visible }) => visible,
                    Ok(_) => continue,
                    // The toggle may be among the skipped events
                    Err(RecvError::Lagged(_)) => state.get_snapshot().await.debug_visible,
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = control.set_preview(visible) {
                    warn!("Failed to toggle tracker preview: {}", e);
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
