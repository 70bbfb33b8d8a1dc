//! Server-Sent Events for real-time avatar updates

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::output::AvatarEvent;
use crate::AppState;

/// Create an SSE stream of avatar events
pub fn create_event_stream(
    app_state: Arc<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = avatar_events(app_state).map(|event| Ok(to_sse_event(&event)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Avatar events for one subscriber.
///
/// Sprite and debug events are edge-triggered, so a subscriber that lags
/// behind the broadcast buffer is resynced from the latest snapshot instead
/// of silently missing them.
pub fn avatar_events(app_state: Arc<AppState>) -> impl Stream<Item = AvatarEvent> {
    let rx = app_state.subscribe_events();

    BroadcastStream::new(rx)
        .then(move |result| {
            let app_state = Arc::clone(&app_state);
            async move {
                match result {
                    Ok(event) => vec![event],
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::debug!("SSE subscriber lagged by {} events, resyncing", skipped);
                        resync_events(&app_state).await
                    }
                }
            }
        })
        .flat_map(stream::iter)
}

async fn resync_events(app_state: &AppState) -> Vec<AvatarEvent> {
    let snapshot = app_state.get_snapshot().await;
    let mut events = Vec::with_capacity(2);

    if !snapshot.sprite.is_empty() {
        events.push(AvatarEvent::Sprite {
            expression: snapshot.expression,
            sprite: snapshot.sprite,
        });
    }
    events.push(AvatarEvent::Debug {
        visible: snapshot.debug_visible,
    });

    events
}

/// Convert an avatar event to an SSE event named after its type
pub fn to_sse_event(event: &AvatarEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());

    Event::default().event(event.name()).data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::{ExpressionState, PoseTransform};
    use crate::output::{AvatarSink, BroadcastSink};
    use crate::pipeline::AvatarSnapshot;
    use crate::Config;

    #[tokio::test]
    async fn test_lagged_subscriber_gets_current_sprite() {
        let (state, _rx) = AppState::new(Config::default());
        let events = avatar_events(Arc::clone(&state));
        futures::pin_mut!(events);

        let mut sink = BroadcastSink::new(state.event_sender());
        sink.show_sprite(ExpressionState::Laugh, "laugh.png");
        for _ in 0..66 {
            sink.apply_transform(&PoseTransform::default());
        }
        state
            .set_snapshot(AvatarSnapshot {
                expression: ExpressionState::Laugh,
                sprite: "laugh.png".to_string(),
                override_expression: Some(ExpressionState::Laugh),
                ..Default::default()
            })
            .await;

        let first = events.next().await;
        assert_eq!(
            first,
            Some(AvatarEvent::Sprite {
                expression: ExpressionState::Laugh,
                sprite: "laugh.png".to_string(),
            })
        );
        assert_eq!(
            events.next().await,
            Some(AvatarEvent::Debug { visible: false })
        );
        assert!(matches!(
            events.next().await,
            Some(AvatarEvent::Transform(_))
        ));
    }

    #[tokio::test]
    async fn test_events_pass_through_in_order() {
        let (state, _rx) = AppState::new(Config::default());
        let events = avatar_events(Arc::clone(&state));
        futures::pin_mut!(events);

        let mut sink = BroadcastSink::new(state.event_sender());
        sink.show_sprite(ExpressionState::Talk, "talk.png");
        sink.set_debug_visible(true);

        assert_eq!(
            events.next().await,
            Some(AvatarEvent::Sprite {
                expression: ExpressionState::Talk,
                sprite: "talk.png".to_string(),
            })
        );
        assert_eq!(
            events.next().await,
            Some(AvatarEvent::Debug { visible: true })
        );
    }
}
