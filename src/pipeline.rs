//! Frame pipeline
//!
//! One task owns the session state and consumes a single queue of frames and
//! key commands. Each event runs to completion before the next is taken, so
//! an override can never land halfway through a frame decision.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::avatar::{
    apply_override, decide_frame, pose, ExpressionState, FaceSignals, PoseProxies, PoseTransform,
    SessionState, SpriteMapping, Transition,
};
use crate::config::{Config, TrackingTuning};
use crate::error::FrameError;
use crate::input::KeyCommand;
use crate::output::AvatarSink;
use crate::tracking::FrameDelivery;
use crate::AppState;

/// Inbound pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Frame(FrameDelivery),
    Key(KeyCommand),
}

/// Read-only view of the pipeline for the HTTP API and page rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AvatarSnapshot {
    pub expression: ExpressionState,
    pub sprite: String,
    pub override_expression: Option<ExpressionState>,
    pub pose: PoseTransform,
    pub proxies: PoseProxies,
    pub debug_visible: bool,
    pub frames_processed: u64,
    pub frames_skipped: u64,
}

/// Landmark interpretation plus the sink it drives
pub struct FramePipeline<S: AvatarSink> {
    tuning: TrackingTuning,
    sprites: SpriteMapping,
    session: SessionState,
    pose: PoseTransform,
    proxies: PoseProxies,
    debug_visible: bool,
    frames_processed: u64,
    frames_skipped: u64,
    sink: S,
}

impl<S: AvatarSink> FramePipeline<S> {
    pub fn new(config: &Config, sink: S) -> Self {
        Self {
            tuning: config.tuning,
            sprites: SpriteMapping::from_config(&config.avatar.sprites),
            session: SessionState::new(),
            pose: PoseTransform::default(),
            proxies: PoseProxies::default(),
            debug_visible: false,
            frames_processed: 0,
            frames_skipped: 0,
            sink,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn pose(&self) -> PoseTransform {
        self.pose
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Frame(delivery) => {
                if let Err(e) = self.handle_frame(&delivery) {
                    self.frames_skipped += 1;
                    match e {
                        FrameError::MalformedFrame => tracing::debug!("Skipping frame: {}", e),
                        FrameError::MissingLandmark { .. } => {
                            tracing::warn!("Skipping frame: {}", e)
                        }
                    }
                }
            }
            PipelineEvent::Key(command) => self.handle_key(command),
        }
    }

    /// Process one frame. On error nothing reaches the sink and the previous
    /// pose and expression stay in place.
    pub fn handle_frame(&mut self, delivery: &FrameDelivery) -> Result<(), FrameError> {
        let face = delivery.primary_face()?;

        let proxies = pose::estimate_proxies(face, &self.tuning)?;
        let signals = FaceSignals::detect(face, &self.tuning)?;

        let transform = pose::proxies_to_transform(&proxies, &self.tuning);
        self.proxies = proxies;
        self.pose = transform;
        self.sink.apply_transform(&transform);

        let transition = decide_frame(self.session, signals);
        self.commit(transition);

        self.frames_processed += 1;
        Ok(())
    }

    /// Apply a key command
    pub fn handle_key(&mut self, command: KeyCommand) {
        match command {
            KeyCommand::Override(cmd) => {
                tracing::info!("Override command: {:?}", cmd);
                let transition = apply_override(self.session, cmd);
                self.commit(transition);
            }
            KeyCommand::ToggleDebug => {
                self.debug_visible = !self.debug_visible;
                tracing::info!("Debug panel visible: {}", self.debug_visible);
                self.sink.set_debug_visible(self.debug_visible);
            }
        }
    }

    fn commit(&mut self, transition: Transition) {
        if let Some(expression) = transition.emit {
            if expression != self.session.current() {
                tracing::info!("Expression: {} -> {}", self.session.current(), expression);
            }
            self.sink
                .show_sprite(expression, self.sprites.sprite(expression));
        }
        self.session = transition.session;
    }

    pub fn snapshot(&self) -> AvatarSnapshot {
        let expression = self.session.current();
        AvatarSnapshot {
            expression,
            sprite: self.sprites.sprite(expression).to_string(),
            override_expression: self.session.override_expression(),
            pose: self.pose,
            proxies: self.proxies,
            debug_visible: self.debug_visible,
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
        }
    }
}

/// Drive the pipeline until shutdown or until every sender is gone
pub async fn run_pipeline<S: AvatarSink>(
    mut pipeline: FramePipeline<S>,
    mut events: mpsc::Receiver<PipelineEvent>,
    state: Arc<AppState>,
) -> FramePipeline<S> {
    let mut shutdown_rx = state.subscribe_shutdown();
    state.set_snapshot(pipeline.snapshot()).await;

    tracing::info!("Frame pipeline started");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        pipeline.handle(event);
                        state.set_snapshot(pipeline.snapshot()).await;
                    }
                    None => {
                        tracing::info!("All pipeline senders dropped");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("Frame pipeline shutting down");
                break;
            }
        }
    }

    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::OverrideCommand;
    use crate::output::{AvatarEvent, BroadcastSink};
    use crate::tracking::{FaceLandmark, Landmark, LandmarkSet};

    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        Transform(PoseTransform),
        Sprite(ExpressionState, String),
        Debug(bool),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<SinkCall>,
    }

    impl RecordingSink {
        fn sprites(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    SinkCall::Sprite(_, s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl AvatarSink for RecordingSink {
        fn apply_transform(&mut self, transform: &PoseTransform) {
            self.calls.push(SinkCall::Transform(*transform));
        }

        fn show_sprite(&mut self, expression: ExpressionState, sprite: &str) {
            self.calls.push(SinkCall::Sprite(expression, sprite.to_string()));
        }

        fn set_debug_visible(&mut self, visible: bool) {
            self.calls.push(SinkCall::Debug(visible));
        }
    }

    /// A full face with level eyes, open eyes and a closed mouth
    fn neutral_face() -> LandmarkSet {
        let mut set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); 478]);
        set.set(FaceLandmark::LeftEyeOuter, Landmark::new(0.35, 0.4));
        set.set(FaceLandmark::RightEyeOuter, Landmark::new(0.65, 0.42));
        set.set(FaceLandmark::NoseTip, Landmark::new(0.52, 0.5));
        set.set(FaceLandmark::LeftCheek, Landmark::new(0.3, 0.55));
        set.set(FaceLandmark::RightCheek, Landmark::new(0.7, 0.55));
        set.set(FaceLandmark::LeftEyeTop, Landmark::new(0.4, 0.38));
        set.set(FaceLandmark::LeftEyeBottom, Landmark::new(0.4, 0.41));
        set.set(FaceLandmark::RightEyeTop, Landmark::new(0.6, 0.38));
        set.set(FaceLandmark::RightEyeBottom, Landmark::new(0.6, 0.41));
        set.set(FaceLandmark::UpperLip, Landmark::new(0.5, 0.62));
        set.set(FaceLandmark::LowerLip, Landmark::new(0.5, 0.63));
        set
    }

    fn talking_face() -> LandmarkSet {
        let mut set = neutral_face();
        set.set(FaceLandmark::LowerLip, Landmark::new(0.5, 0.7));
        set
    }

    fn blinking_face() -> LandmarkSet {
        let mut set = neutral_face();
        set.set(FaceLandmark::LeftEyeBottom, Landmark::new(0.4, 0.385));
        set.set(FaceLandmark::RightEyeBottom, Landmark::new(0.6, 0.385));
        set
    }

    fn talking_and_blinking_face() -> LandmarkSet {
        let mut set = blinking_face();
        set.set(FaceLandmark::LowerLip, Landmark::new(0.5, 0.7));
        set
    }

    fn frame(face: LandmarkSet) -> PipelineEvent {
        PipelineEvent::Frame(FrameDelivery::with_face(face))
    }

    fn pipeline() -> FramePipeline<RecordingSink> {
        FramePipeline::new(&Config::default(), RecordingSink::default())
    }

    #[test]
    fn test_neutral_frame_moves_but_keeps_sprite() {
        let mut p = pipeline();
        p.handle(frame(neutral_face()));

        assert_eq!(p.sink().calls.len(), 1);
        assert!(matches!(p.sink().calls[0], SinkCall::Transform(_)));
        assert_eq!(p.session().current(), ExpressionState::Base);
    }

    #[test]
    fn test_same_frame_twice_is_idempotent() {
        let mut p = pipeline();
        p.handle(frame(talking_face()));
        let first_pose = p.pose();
        p.handle(frame(talking_face()));

        assert_eq!(p.pose(), first_pose);
        assert_eq!(p.sink().sprites(), vec!["talk.png"]);
        let transforms: Vec<_> = p
            .sink()
            .calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Transform(_)))
            .collect();
        assert_eq!(transforms.len(), 2);
        assert_eq!(transforms[0], transforms[1]);
    }

    #[test]
    fn test_talk_wins_over_blink() {
        let mut p = pipeline();
        p.handle(frame(talking_and_blinking_face()));
        assert_eq!(p.session().current(), ExpressionState::Talk);
        assert_eq!(p.sink().sprites(), vec!["talk.png"]);
    }

    #[test]
    fn test_blink_then_open() {
        let mut p = pipeline();
        p.handle(frame(blinking_face()));
        p.handle(frame(neutral_face()));
        assert_eq!(p.sink().sprites(), vec!["blink.png", "base.png"]);
    }

    #[test]
    fn test_laugh_override_beats_talking() {
        let mut p = pipeline();
        p.handle(PipelineEvent::Key(KeyCommand::Override(OverrideCommand::Laugh)));
        p.handle(frame(talking_face()));
        p.handle(frame(blinking_face()));

        assert_eq!(p.session().current(), ExpressionState::Laugh);
        assert_eq!(p.sink().sprites(), vec!["laugh.png"]);
    }

    #[test]
    fn test_repeated_override_reasserts_sprite() {
        let mut p = pipeline();
        p.handle(PipelineEvent::Key(KeyCommand::Override(OverrideCommand::Cry)));
        p.handle(PipelineEvent::Key(KeyCommand::Override(OverrideCommand::Cry)));
        assert_eq!(p.sink().sprites(), vec!["cry.png", "cry.png"]);
    }

    #[test]
    fn test_clear_override_returns_to_base() {
        let mut p = pipeline();
        p.handle(PipelineEvent::Key(KeyCommand::Override(OverrideCommand::Laugh)));
        p.handle(frame(talking_face()));
        p.handle(PipelineEvent::Key(KeyCommand::Override(OverrideCommand::Clear)));
        p.handle(frame(neutral_face()));

        assert_eq!(p.session().current(), ExpressionState::Base);
        assert_eq!(p.session().override_expression(), None);
        assert_eq!(p.sink().sprites(), vec!["laugh.png", "base.png"]);

        // automatic detection is back
        p.handle(frame(talking_face()));
        assert_eq!(p.session().current(), ExpressionState::Talk);
    }

    #[test]
    fn test_zero_face_frame_is_noop() {
        let mut p = pipeline();
        p.handle(frame(talking_face()));
        let before = p.snapshot();
        let calls_before = p.sink().calls.len();

        p.handle(PipelineEvent::Frame(FrameDelivery::empty()));

        assert_eq!(p.sink().calls.len(), calls_before);
        let after = p.snapshot();
        assert_eq!(after.expression, before.expression);
        assert_eq!(after.pose, before.pose);
        assert_eq!(after.frames_skipped, 1);
        assert_eq!(
            p.handle_frame(&FrameDelivery::empty()),
            Err(FrameError::MalformedFrame)
        );
    }

    #[test]
    fn test_missing_landmark_skips_whole_frame() {
        let mut p = pipeline();
        p.handle(frame(blinking_face()));
        let before = p.snapshot();
        let calls_before = p.sink().calls.len();

        // lips present, right cheek missing: no partial transform
        let truncated = LandmarkSet::new(
            (0..400)
                .map(|i| talking_face().point(i).unwrap())
                .collect(),
        );
        let err = p.handle_frame(&FrameDelivery::with_face(truncated)).unwrap_err();

        assert!(matches!(err, FrameError::MissingLandmark { index: 454, .. }));
        assert_eq!(p.sink().calls.len(), calls_before);
        assert_eq!(p.snapshot().pose, before.pose);
        assert_eq!(p.session().current(), ExpressionState::Blink);
    }

    #[test]
    fn test_only_first_face_is_used() {
        let mut p = pipeline();
        let delivery = FrameDelivery {
            faces: vec![neutral_face(), talking_face()],
            timestamp_ms: None,
        };
        p.handle(PipelineEvent::Frame(delivery));
        assert_eq!(p.session().current(), ExpressionState::Base);
    }

    #[test]
    fn test_debug_toggle_leaves_expression_alone() {
        let mut p = pipeline();
        p.handle(PipelineEvent::Key(KeyCommand::ToggleDebug));
        p.handle(PipelineEvent::Key(KeyCommand::ToggleDebug));

        assert_eq!(
            p.sink().calls,
            vec![SinkCall::Debug(true), SinkCall::Debug(false)]
        );
        assert_eq!(p.session(), SessionState::new());
    }

    #[test]
    fn test_custom_sprite_names() {
        let mut config = Config::default();
        config.avatar.sprites.talk = "mouth_open.webp".to_string();
        let mut p = FramePipeline::new(&config, RecordingSink::default());
        p.handle(frame(talking_face()));
        assert_eq!(p.sink().sprites(), vec!["mouth_open.webp"]);
        assert_eq!(p.snapshot().sprite, "mouth_open.webp");
    }

    #[tokio::test]
    async fn test_run_pipeline_serializes_events() {
        let config = Config::default();
        let (state, events_rx) = AppState::new(config.clone());
        let mut avatar_rx = state.subscribe_events();

        let sink = BroadcastSink::new(state.event_sender());
        let handle = tokio::spawn(run_pipeline(
            FramePipeline::new(&config, sink),
            events_rx,
            Arc::clone(&state),
        ));

        let tx = state.pipeline_sender();
        tx.send(frame(talking_face())).await.unwrap();
        tx.send(PipelineEvent::Key(KeyCommand::Override(OverrideCommand::Laugh)))
            .await
            .unwrap();
        tx.send(frame(talking_face())).await.unwrap();

        let mut events = Vec::new();
        while events.len() < 4 {
            events.push(avatar_rx.recv().await.unwrap());
        }

        assert!(matches!(events[0], AvatarEvent::Transform(_)));
        assert_eq!(
            events[1],
            AvatarEvent::Sprite {
                expression: ExpressionState::Talk,
                sprite: "talk.png".to_string(),
            }
        );
        assert_eq!(
            events[2],
            AvatarEvent::Sprite {
                expression: ExpressionState::Laugh,
                sprite: "laugh.png".to_string(),
            }
        );
        assert!(matches!(events[3], AvatarEvent::Transform(_)));

        state.shutdown();
        let pipeline = handle.await.unwrap();
        assert_eq!(pipeline.session().current(), ExpressionState::Laugh);

        let snapshot = state.get_snapshot().await;
        assert_eq!(snapshot.expression, ExpressionState::Laugh);
        assert_eq!(snapshot.override_expression, Some(ExpressionState::Laugh));
        assert_eq!(snapshot.frames_processed, 2);
    }
}
