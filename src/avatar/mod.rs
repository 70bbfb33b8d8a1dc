//! Avatar module
//!
//! Head pose, expression classification and sprite assets.

pub mod assets;
pub mod expression;
pub mod pose;
pub mod state;

pub use assets::AssetManager;
pub use expression::{ExpressionState, FaceSignals, SpriteMapping};
pub use pose::{estimate_pose, PoseProxies, PoseTransform};
pub use state::{apply_override, decide_frame, OverrideCommand, SessionState, Transition};
