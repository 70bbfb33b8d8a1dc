//! Expression types, landmark signals and sprite mapping

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::{SpriteConfig, TrackingTuning};
use crate::error::FrameError;
use crate::tracking::landmarks::{FaceLandmark, LandmarkSet};

/// The avatar's displayed expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionState {
    #[default]
    Base,
    Blink,
    Talk,
    /// Only reachable through a manual override
    Laugh,
    /// Only reachable through a manual override
    Cry,
}

impl ExpressionState {
    pub const ALL: [ExpressionState; 5] = [
        ExpressionState::Base,
        ExpressionState::Blink,
        ExpressionState::Talk,
        ExpressionState::Laugh,
        ExpressionState::Cry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionState::Base => "base",
            ExpressionState::Blink => "blink",
            ExpressionState::Talk => "talk",
            ExpressionState::Laugh => "laugh",
            ExpressionState::Cry => "cry",
        }
    }
}

impl std::fmt::Display for ExpressionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpressionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(ExpressionState::Base),
            "blink" => Ok(ExpressionState::Blink),
            "talk" => Ok(ExpressionState::Talk),
            "laugh" => Ok(ExpressionState::Laugh),
            "cry" => Ok(ExpressionState::Cry),
            other => Err(format!("unknown expression: {}", other)),
        }
    }
}

/// Boolean facial signals derived from one landmark set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceSignals {
    /// Lips apart beyond the mouth threshold
    pub talking: bool,
    /// Both eyelid gaps under the blink threshold
    pub blinking: bool,
}

impl FaceSignals {
    /// Threshold the lip and eyelid gaps.
    ///
    /// Comparisons are strict: a gap exactly at a threshold is neither
    /// talking nor a closed eye.
    pub fn detect(landmarks: &LandmarkSet, tuning: &TrackingTuning) -> Result<Self, FrameError> {
        let mouth_gap = vertical_gap(landmarks, FaceLandmark::UpperLip, FaceLandmark::LowerLip)?;
        let left_gap =
            vertical_gap(landmarks, FaceLandmark::LeftEyeTop, FaceLandmark::LeftEyeBottom)?;
        let right_gap =
            vertical_gap(landmarks, FaceLandmark::RightEyeTop, FaceLandmark::RightEyeBottom)?;

        Ok(Self {
            talking: mouth_gap > tuning.mouth_threshold,
            blinking: left_gap < tuning.blink_threshold && right_gap < tuning.blink_threshold,
        })
    }

    /// Automatic classification. Talking wins over blinking.
    pub fn classify(&self) -> ExpressionState {
        if self.talking {
            ExpressionState::Talk
        } else if self.blinking {
            ExpressionState::Blink
        } else {
            ExpressionState::Base
        }
    }
}

fn vertical_gap(
    landmarks: &LandmarkSet,
    top: FaceLandmark,
    bottom: FaceLandmark,
) -> Result<f64, FrameError> {
    Ok((landmarks.get(top)?.y - landmarks.get(bottom)?.y).abs())
}

/// Total mapping from expression to sprite identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteMapping {
    base: String,
    blink: String,
    talk: String,
    laugh: String,
    cry: String,
}

impl Default for SpriteMapping {
    fn default() -> Self {
        Self::from_config(&SpriteConfig::default())
    }
}

impl SpriteMapping {
    /// Build the mapping from config. Empty entries fall back to the base
    /// sprite; an empty base falls back to `base.png`.
    pub fn from_config(config: &SpriteConfig) -> Self {
        let base = if config.base.trim().is_empty() {
            SpriteConfig::default().base
        } else {
            config.base.clone()
        };
        let or_base = |s: &String| {
            if s.trim().is_empty() {
                base.clone()
            } else {
                s.clone()
            }
        };

        Self {
            blink: or_base(&config.blink),
            talk: or_base(&config.talk),
            laugh: or_base(&config.laugh),
            cry: or_base(&config.cry),
            base,
        }
    }

    /// Sprite identifier for an expression
    pub fn sprite(&self, state: ExpressionState) -> &str {
        match state {
            ExpressionState::Base => &self.base,
            ExpressionState::Blink => &self.blink,
            ExpressionState::Talk => &self.talk,
            ExpressionState::Laugh => &self.laugh,
            ExpressionState::Cry => &self.cry,
        }
    }

    /// All (expression, sprite) pairs
    pub fn entries(&self) -> impl Iterator<Item = (ExpressionState, &str)> {
        ExpressionState::ALL
            .into_iter()
            .map(move |state| (state, self.sprite(state)))
    }
}
