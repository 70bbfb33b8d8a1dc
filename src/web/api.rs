//! REST API endpoints

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::avatar::ExpressionState;
use crate::input::{Hotkeys, KeyCommand};
use crate::output::sse;
use crate::pipeline::PipelineEvent;
use crate::AppState;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    pub fn error(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        })
    }
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub expression: ExpressionState,
    pub override_expression: Option<ExpressionState>,
    pub sprite: String,
    pub debug_visible: bool,
    pub frames_processed: u64,
    pub frames_skipped: u64,
}

/// Get current status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.get_snapshot().await;

    ApiResponse::success(StatusResponse {
        version: crate::VERSION.to_string(),
        expression: snapshot.expression,
        override_expression: snapshot.override_expression,
        sprite: snapshot.sprite,
        debug_visible: snapshot.debug_visible,
        frames_processed: snapshot.frames_processed,
        frames_skipped: snapshot.frames_skipped,
    })
}

/// Get the full pipeline snapshot
pub async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.get_snapshot().await)
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().await;
    Json(config.clone())
}

/// Key press request, `key` as in `KeyboardEvent.key`
#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

/// Resolve a key press and forward the command to the pipeline
pub async fn press_key(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KeyRequest>,
) -> Json<ApiResponse<KeyCommand>> {
    let hotkeys = {
        let config = state.config.read().await;
        Hotkeys::from_config(&config.hotkeys)
    };

    let command = match hotkeys.resolve_str(&request.key) {
        Some(command) => command,
        None => {
            tracing::debug!("Ignoring unbound key: {:?}", request.key);
            return ApiResponse::error(&format!("Unbound key: {}", request.key));
        }
    };

    send_command(&state, command).await
}

/// Toggle the debug panel
pub async fn toggle_debug(State(state): State<Arc<AppState>>) -> Json<ApiResponse<KeyCommand>> {
    send_command(&state, KeyCommand::ToggleDebug).await
}

async fn send_command(state: &AppState, command: KeyCommand) -> Json<ApiResponse<KeyCommand>> {
    match state.pipeline_sender().send(PipelineEvent::Key(command)).await {
        Ok(()) => ApiResponse::success(command),
        Err(_) => ApiResponse::error("Frame pipeline is not running"),
    }
}

/// SSE stream endpoint
pub async fn event_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse::create_event_stream(state)
}
