//! Browser source HTTP server (overlay page, SSE and sprite assets)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::avatar::AssetManager;
use crate::config::AvatarConfig;
use crate::output::sse;
use crate::AppState;

/// Browser source server state
pub struct BrowserServer {
    app_state: Arc<AppState>,
    asset_manager: AssetManager,
}

impl BrowserServer {
    /// Create a new browser server
    pub fn new(app_state: Arc<AppState>, avatar_config: &AvatarConfig) -> Self {
        Self {
            app_state,
            asset_manager: AssetManager::new(avatar_config),
        }
    }

    /// Create the router for browser source endpoints
    pub fn router(self) -> Router {
        let assets_dir = self.asset_manager.base_dir().to_path_buf();
        let shared_state = Arc::new(self);

        Router::new()
            .route("/avatar", get(avatar_page))
            .route("/avatar/stream", get(avatar_stream))
            .route("/avatar/current-image", get(current_image))
            .nest_service("/assets", ServeDir::new(assets_dir))
            .with_state(shared_state)
    }
}

/// Browser source state (shared)
type BrowserState = Arc<BrowserServer>;

/// Render the overlay page
async fn avatar_page(State(state): State<BrowserState>) -> Html<String> {
    let snapshot = state.app_state.get_snapshot().await;
    let base_sprite = state
        .asset_manager
        .mapping()
        .sprite(crate::avatar::ExpressionState::Base)
        .to_string();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>facesprite</title>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            background: transparent;
            overflow: hidden;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
        }}
        .character-container {{
            position: relative;
            display: flex;
            justify-content: center;
            align-items: center;
        }}
        .character {{
            max-width: 100%;
            max-height: 100vh;
            object-fit: contain;
        }}
        .debug-panel {{
            display: none;
            position: fixed;
            left: 8px;
            bottom: 8px;
            padding: 6px 8px;
            font: 12px monospace;
            color: #0f0;
            background: rgba(0, 0, 0, 0.7);
            white-space: pre;
        }}
        .debug-panel.show {{
            display: block;
        }}
    </style>
</head>
<body>
    <div class="character-container" style="transform: {transform}">
        <img
            id="character"
            class="character"
            src="/assets/{sprite}"
            alt="Avatar"
            onerror="this.onerror=null; this.src='/assets/{base_sprite}'"
        >
    </div>
    <div id="debug" class="debug-panel{debug_class}"></div>

    <script>
        const container = document.querySelector('.character-container');
        const character = document.getElementById('character');
        const debugPanel = document.getElementById('debug');
        const debugInfo = {{ transform: null, sprite: '{sprite}' }};

        function renderDebug() {{
            debugPanel.textContent = JSON.stringify(debugInfo, null, 2);
        }}

        const evtSource = new EventSource('/avatar/stream');

        evtSource.addEventListener('transform', function(event) {{
            const t = JSON.parse(event.data);
            container.style.transform =
                `translate(${{t.translate_x}}px, ${{t.translate_y}}px) rotate(${{t.rotation_deg}}deg)`;
            debugInfo.transform = t;
            if (debugPanel.classList.contains('show')) renderDebug();
        }});

        evtSource.addEventListener('sprite', function(event) {{
            const data = JSON.parse(event.data);
            character.src = '/assets/' + data.sprite;
            debugInfo.sprite = data.sprite;
            renderDebug();
        }});

        evtSource.addEventListener('debug', function(event) {{
            const data = JSON.parse(event.data);
            debugPanel.classList.toggle('show', data.visible);
            renderDebug();
        }});

        evtSource.onerror = function(err) {{
            console.error('SSE error:', err);
            setTimeout(function() {{
                window.location.reload();
            }}, 5000);
        }};

        window.addEventListener('keydown', function(e) {{
            if (e.key.length !== 1) return;
            fetch('/api/key', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify({{ key: e.key }})
            }});
        }});

        renderDebug();
    </script>
</body>
</html>"#,
        transform = snapshot.pose.to_css(),
        sprite = if snapshot.sprite.is_empty() { &base_sprite } else { &snapshot.sprite },
        base_sprite = base_sprite,
        debug_class = if snapshot.debug_visible { " show" } else { "" },
    );

    Html(html)
}

/// SSE endpoint for avatar events
async fn avatar_stream(State(state): State<BrowserState>) -> impl IntoResponse {
    sse::create_event_stream(Arc::clone(&state.app_state))
}

/// Get the current sprite image directly
async fn current_image(State(state): State<BrowserState>) -> Response {
    let snapshot = state.app_state.get_snapshot().await;

    match state.asset_manager.get_data(snapshot.expression) {
        Ok((data, mime)) => (StatusCode::OK, [(header::CONTENT_TYPE, mime)], data).into_response(),
        Err(e) => {
            tracing::debug!("No sprite to serve: {}", e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
