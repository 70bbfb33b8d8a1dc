//! Head pose approximation from face landmarks
//!
//! A flat sprite cannot show yaw or pitch, so both are turned into screen
//! translation. Only roll (the eye line angle) becomes a rotation.

use serde::{Deserialize, Serialize};

use crate::config::TrackingTuning;
use crate::error::FrameError;
use crate::tracking::landmarks::{FaceLandmark, LandmarkSet};

/// Uncalibrated head pose proxies for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseProxies {
    /// Eye line angle in degrees
    pub roll_deg: f64,
    /// Nose offset from the cheek midpoint, scaled by the angle gain
    pub yaw: f64,
    /// Nose offset from the eye line, scaled by the angle gain
    pub pitch: f64,
}

/// 2D rigid transform applied to the avatar container
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub rotation_deg: f64,
}

impl PoseTransform {
    /// CSS form, translate first then rotate
    pub fn to_css(&self) -> String {
        format!(
            "translate({}px, {}px) rotate({}deg)",
            self.translate_x, self.translate_y, self.rotation_deg
        )
    }
}

/// Compute the pose proxies from a landmark set
pub fn estimate_proxies(
    landmarks: &LandmarkSet,
    tuning: &TrackingTuning,
) -> Result<PoseProxies, FrameError> {
    let left_eye = landmarks.get(FaceLandmark::LeftEyeOuter)?;
    let right_eye = landmarks.get(FaceLandmark::RightEyeOuter)?;
    let nose = landmarks.get(FaceLandmark::NoseTip)?;
    let left_cheek = landmarks.get(FaceLandmark::LeftCheek)?;
    let right_cheek = landmarks.get(FaceLandmark::RightCheek)?;

    let dx = right_eye.x - left_eye.x;
    let dy = right_eye.y - left_eye.y;
    let roll_deg = dy.atan2(dx).to_degrees();

    let cheek_mid_x = (left_cheek.x + right_cheek.x) / 2.0;
    let yaw = (nose.x - cheek_mid_x) * tuning.angle_gain;

    let eye_mid_y = (left_eye.y + right_eye.y) / 2.0;
    let pitch = (nose.y - eye_mid_y) * tuning.angle_gain;

    Ok(PoseProxies {
        roll_deg,
        yaw,
        pitch,
    })
}

/// Map proxies to a screen transform. Yaw is mirrored so the avatar moves
/// the same way as the user's reflection.
pub fn proxies_to_transform(proxies: &PoseProxies, tuning: &TrackingTuning) -> PoseTransform {
    PoseTransform {
        translate_x: -proxies.yaw * tuning.translation_gain,
        translate_y: proxies.pitch * tuning.translation_gain,
        rotation_deg: proxies.roll_deg,
    }
}

/// Estimate the avatar transform for a landmark set
pub fn estimate_pose(
    landmarks: &LandmarkSet,
    tuning: &TrackingTuning,
) -> Result<PoseTransform, FrameError> {
    let proxies = estimate_proxies(landmarks, tuning)?;
    Ok(proxies_to_transform(&proxies, tuning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::Landmark;

    fn face(
        left_eye: (f64, f64),
        right_eye: (f64, f64),
        nose: (f64, f64),
        cheeks_x: (f64, f64),
    ) -> LandmarkSet {
        let mut set = LandmarkSet::default();
        set.set(FaceLandmark::LeftEyeOuter, Landmark::new(left_eye.0, left_eye.1));
        set.set(FaceLandmark::RightEyeOuter, Landmark::new(right_eye.0, right_eye.1));
        set.set(FaceLandmark::NoseTip, Landmark::new(nose.0, nose.1));
        set.set(FaceLandmark::LeftCheek, Landmark::new(cheeks_x.0, 0.5));
        set.set(FaceLandmark::RightCheek, Landmark::new(cheeks_x.1, 0.5));
        set
    }

    #[test]
    fn test_roll_is_eye_line_angle() {
        let tuning = TrackingTuning::default();
        let cases = [
            ((0.3, 0.4), (0.7, 0.4)),
            ((0.3, 0.4), (0.7, 0.5)),
            ((0.3, 0.45), (0.6, 0.35)),
            ((0.7, 0.4), (0.3, 0.41)),
        ];

        for (left, right) in cases {
            let set = face(left, right, (0.5, 0.5), (0.2, 0.8));
            let proxies = estimate_proxies(&set, &tuning).unwrap();
            let expected = (right.1 - left.1).atan2(right.0 - left.0) * (180.0 / std::f64::consts::PI);
            assert_eq!(proxies.roll_deg, expected);

            let transform = estimate_pose(&set, &tuning).unwrap();
            assert_eq!(transform.rotation_deg, expected);
        }
    }

    #[test]
    fn test_level_eyes_have_no_roll() {
        let set = face((0.3, 0.4), (0.7, 0.4), (0.5, 0.5), (0.2, 0.8));
        let transform = estimate_pose(&set, &TrackingTuning::default()).unwrap();
        assert_eq!(transform.rotation_deg, 0.0);
    }

    #[test]
    fn test_yaw_translation_is_mirrored_and_scaled() {
        let tuning = TrackingTuning::default();
        // cheek midpoint 0.5, nose offset 0.25
        let set = face((0.3, 0.4), (0.7, 0.4), (0.75, 0.4), (0.25, 0.75));
        let proxies = estimate_proxies(&set, &tuning).unwrap();
        assert_eq!(proxies.yaw, 0.75);
        assert_eq!(proxies.pitch, 0.0);

        let transform = proxies_to_transform(&proxies, &tuning);
        assert_eq!(transform.translate_x, -750.0);
        assert_eq!(transform.translate_y, 0.0);
    }

    #[test]
    fn test_pitch_translation() {
        let tuning = TrackingTuning::default();
        // eye midline 0.25, nose offset 0.125
        let set = face((0.25, 0.25), (0.75, 0.25), (0.5, 0.375), (0.25, 0.75));
        let transform = estimate_pose(&set, &tuning).unwrap();
        assert_eq!(transform.translate_y, 0.125 * 3.0 * 1000.0);
        assert_eq!(transform.translate_x, 0.0);
    }

    #[test]
    fn test_proxies_are_linear() {
        let tuning = TrackingTuning::default();
        // offsets are powers of two so doubling is exact
        let single = face((0.25, 0.25), (0.75, 0.25), (0.5625, 0.3125), (0.25, 0.75));
        let double = face((0.25, 0.25), (0.75, 0.25), (0.625, 0.375), (0.25, 0.75));

        let a = estimate_pose(&single, &tuning).unwrap();
        let b = estimate_pose(&double, &tuning).unwrap();

        assert_eq!(b.translate_x, 2.0 * a.translate_x);
        assert_eq!(b.translate_y, 2.0 * a.translate_y);
        assert_eq!(a.translate_x, -0.0625 * 3.0 * 1000.0);
    }

    #[test]
    fn test_same_input_same_output() {
        let tuning = TrackingTuning::default();
        let set = face((0.31, 0.42), (0.69, 0.47), (0.52, 0.55), (0.18, 0.83));
        assert_eq!(
            estimate_pose(&set, &tuning).unwrap(),
            estimate_pose(&set, &tuning).unwrap()
        );
    }

    #[test]
    fn test_missing_landmark_fails() {
        let set = LandmarkSet::new(vec![Landmark::default(); 200]);
        let err = estimate_pose(&set, &TrackingTuning::default()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MissingLandmark { landmark: FaceLandmark::RightEyeOuter, index: 263 }
        ));
    }

    #[test]
    fn test_css() {
        let transform = PoseTransform {
            translate_x: -12.5,
            translate_y: 4.0,
            rotation_deg: 3.25,
        };
        assert_eq!(transform.to_css(), "translate(-12.5px, 4px) rotate(3.25deg)");
    }
}
