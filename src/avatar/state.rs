//! Expression state machine
//!
//! The session state is owned by the caller and threaded through
//! [`decide_frame`] and [`apply_override`]; neither keeps any state of its own.

use serde::{Deserialize, Serialize};

use super::expression::{ExpressionState, FaceSignals};

/// Expression state carried between frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Expression currently shown
    current: ExpressionState,
    /// Manual override, if any. Bypasses automatic detection while set.
    override_expression: Option<ExpressionState>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ExpressionState {
        self.current
    }

    pub fn override_expression(&self) -> Option<ExpressionState> {
        self.override_expression
    }
}

/// Manual override commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideCommand {
    Laugh,
    Cry,
    Clear,
}

/// Result of one decision step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Session state to use for the next step
    pub session: SessionState,
    /// Sprite to show, if the sink must be updated
    pub emit: Option<ExpressionState>,
}

/// Decide the expression for one frame.
///
/// Emits only when the decided expression differs from the current one.
pub fn decide_frame(session: SessionState, signals: FaceSignals) -> Transition {
    let next = session
        .override_expression
        .unwrap_or_else(|| signals.classify());

    if next == session.current {
        return Transition {
            session,
            emit: None,
        };
    }

    Transition {
        session: SessionState {
            current: next,
            ..session
        },
        emit: Some(next),
    }
}

/// Apply a manual override command. Always emits, so repeating a command
/// re-asserts the sprite.
pub fn apply_override(_session: SessionState, command: OverrideCommand) -> Transition {
    let (override_expression, current) = match command {
        OverrideCommand::Laugh => (Some(ExpressionState::Laugh), ExpressionState::Laugh),
        OverrideCommand::Cry => (Some(ExpressionState::Cry), ExpressionState::Cry),
        OverrideCommand::Clear => (None, ExpressionState::Base),
    };

    Transition {
        session: SessionState {
            current,
            override_expression,
        },
        emit: Some(current),
    }
}
