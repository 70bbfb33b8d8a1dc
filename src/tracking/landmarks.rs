//! Face landmark topology and landmark sets
//!
//! Indices follow the MediaPipe Face Mesh topology (468 points, 478 with
//! iris refinement). The table below is the only place indices appear; a
//! topology change in the tracker means updating this table.

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Number of points in the base Face Mesh topology
pub const FACE_MESH_POINTS: usize = 468;

/// Named landmarks used by pose estimation and expression detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceLandmark {
    NoseTip,
    UpperLip,
    LowerLip,
    LeftEyeOuter,
    LeftEyeBottom,
    LeftEyeTop,
    LeftCheek,
    RightEyeOuter,
    RightEyeBottom,
    RightEyeTop,
    RightCheek,
}

impl FaceLandmark {
    /// Every named landmark, in index order
    pub const ALL: [FaceLandmark; 11] = [
        FaceLandmark::NoseTip,
        FaceLandmark::UpperLip,
        FaceLandmark::LowerLip,
        FaceLandmark::LeftEyeOuter,
        FaceLandmark::LeftEyeBottom,
        FaceLandmark::LeftEyeTop,
        FaceLandmark::LeftCheek,
        FaceLandmark::RightEyeOuter,
        FaceLandmark::RightEyeBottom,
        FaceLandmark::RightEyeTop,
        FaceLandmark::RightCheek,
    ];

    /// Face Mesh index for this landmark
    pub const fn index(self) -> usize {
        match self {
            FaceLandmark::NoseTip => 1,
            FaceLandmark::UpperLip => 13,
            FaceLandmark::LowerLip => 14,
            FaceLandmark::LeftEyeOuter => 33,
            FaceLandmark::LeftEyeBottom => 145,
            FaceLandmark::LeftEyeTop => 159,
            FaceLandmark::LeftCheek => 234,
            FaceLandmark::RightEyeOuter => 263,
            FaceLandmark::RightEyeBottom => 374,
            FaceLandmark::RightEyeTop => 386,
            FaceLandmark::RightCheek => 454,
        }
    }
}

/// A single tracked point in the tracker's normalized image space.
/// `z` is carried for completeness but never used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// All landmarks of one face for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Number of points delivered
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw access by index
    pub fn point(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    /// Look up a named landmark
    pub fn get(&self, landmark: FaceLandmark) -> Result<Landmark, FrameError> {
        let index = landmark.index();
        self.point(index)
            .ok_or(FrameError::MissingLandmark { landmark, index })
    }

    /// Replace one point, growing the set with zeroed points if needed
    pub fn set(&mut self, landmark: FaceLandmark, point: Landmark) {
        let index = landmark.index();
        if self.points.len() <= index {
            self.points.resize(index + 1, Landmark::default());
        }
        self.points[index] = point;
    }
}

/// One frame's detection result: zero or more faces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDelivery {
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
    /// Tracker-side capture timestamp, if provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
}

impl FrameDelivery {
    pub fn with_face(face: LandmarkSet) -> Self {
        Self {
            faces: vec![face],
            timestamp_ms: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The face that drives the avatar. Extra faces are ignored.
    pub fn primary_face(&self) -> Result<&LandmarkSet, FrameError> {
        self.faces.first().ok_or(FrameError::MalformedFrame)
    }
}
