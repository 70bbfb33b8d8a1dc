//! facesprite - Headless PNGTuber overlay driven by face landmarks
//!
//! Turns a stream of face landmark sets into:
//! - a 2D transform (screen translation plus roll) for the avatar container
//! - one of five expression sprites (base, blink, talk, laugh, cry)
//!
//! Landmarks come from a MediaPipe Face Mesh helper over UDP, hotkeys from
//! the overlay page or HTTP API, and output goes to a browser source via SSE.

pub mod avatar;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod tracking;
pub mod web;

pub use config::Config;
pub use error::{FacespriteError, Result};

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

use output::AvatarEvent;
use pipeline::{AvatarSnapshot, PipelineEvent};

/// Application state shared across all components
#[derive(Debug)]
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Latest pipeline snapshot
    snapshot: RwLock<AvatarSnapshot>,
    /// Inbound queue to the frame pipeline
    pipeline_tx: mpsc::Sender<PipelineEvent>,
    /// Outbound avatar events
    events_tx: broadcast::Sender<AvatarEvent>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state. The returned receiver is the
    /// pipeline's inbound queue and must be handed to `run_pipeline`.
    pub fn new(config: Config) -> (Arc<Self>, mpsc::Receiver<PipelineEvent>) {
        let (pipeline_tx, pipeline_rx) = mpsc::channel(config.pipeline.queue_capacity.max(1));
        let (events_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(Self {
            config: RwLock::new(config),
            snapshot: RwLock::new(AvatarSnapshot::default()),
            pipeline_tx,
            events_tx,
            shutdown_tx,
        });

        (state, pipeline_rx)
    }

    /// Sender for frames and key commands
    pub fn pipeline_sender(&self) -> mpsc::Sender<PipelineEvent> {
        self.pipeline_tx.clone()
    }

    /// Sender used by the broadcast sink
    pub fn event_sender(&self) -> broadcast::Sender<AvatarEvent> {
        self.events_tx.clone()
    }

    /// Subscribe to avatar events
    pub fn subscribe_events(&self) -> broadcast::Receiver<AvatarEvent> {
        self.events_tx.subscribe()
    }

    /// Store the latest pipeline snapshot
    pub async fn set_snapshot(&self, snapshot: AvatarSnapshot) {
        let mut current = self.snapshot.write().await;
        *current = snapshot;
    }

    /// Get the latest pipeline snapshot
    pub async fn get_snapshot(&self) -> AvatarSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
