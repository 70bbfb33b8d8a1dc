//! Output module
//!
//! The visual sink the frame pipeline drives, and the browser source that
//! renders it:
//! - broadcast sink feeding SSE subscribers
//! - browser source overlay page (HTTP/SSE)

pub mod browser;
pub mod sse;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::avatar::{ExpressionState, PoseTransform};

/// Receives the pipeline's outputs
pub trait AvatarSink: Send {
    /// Move and rotate the avatar container. Called for every processed frame.
    fn apply_transform(&mut self, transform: &PoseTransform);

    /// Swap the displayed sprite
    fn show_sprite(&mut self, expression: ExpressionState, sprite: &str);

    /// Show or hide the debug panel
    fn set_debug_visible(&mut self, visible: bool);
}

/// Event sent to overlay clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AvatarEvent {
    Transform(PoseTransform),
    Sprite {
        expression: ExpressionState,
        sprite: String,
    },
    Debug {
        visible: bool,
    },
}

impl AvatarEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            AvatarEvent::Transform(_) => "transform",
            AvatarEvent::Sprite { .. } => "sprite",
            AvatarEvent::Debug { .. } => "debug",
        }
    }
}

/// Sink that publishes every output as an [`AvatarEvent`]
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<AvatarEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<AvatarEvent>) -> Self {
        Self { tx }
    }

    fn publish(&self, event: AvatarEvent) {
        // No subscribers is fine: the overlay may not be open yet
        let _ = self.tx.send(event);
    }
}

impl AvatarSink for BroadcastSink {
    fn apply_transform(&mut self, transform: &PoseTransform) {
        self.publish(AvatarEvent::Transform(*transform));
    }

    fn show_sprite(&mut self, expression: ExpressionState, sprite: &str) {
        self.publish(AvatarEvent::Sprite {
            expression,
            sprite: sprite.to_string(),
        });
    }

    fn set_debug_visible(&mut self, visible: bool) {
        self.publish(AvatarEvent::Debug { visible });
    }
}
