//! Tracking module
//!
//! Face landmark input: the landmark topology table, the UDP receiver for
//! the Face Mesh helper, and the helper subprocess.

pub mod landmarks;
pub mod mediapipe;
pub mod subprocess;

pub use landmarks::{FaceLandmark, FrameDelivery, Landmark, LandmarkSet};
pub use mediapipe::{MpReceiver, TrackerControl};
