//! Pose geometry
//!
//! Pure vector and angle math over landmark triples. Missing landmarks and
//! degenerate geometry are expected, frequent states in noisy pose data, so
//! every function here reports "no value" as `None` rather than an error.

use crate::types::{Landmark, LandmarkId, Pose};
use std::collections::HashMap;

/// Vectors shorter than this are treated as degenerate (zero-length) when
/// computing angles.
pub const MIN_VECTOR_MAGNITUDE: f64 = 1e-6;

/// The fixed set of joints tracked by [`all_joint_angles`], each defined by
/// the three landmarks (a, vertex, c) forming the angle.
pub const JOINT_TRIPLES: [(&str, LandmarkId, LandmarkId, LandmarkId); 8] = [
    (
        "left_elbow",
        LandmarkId::LeftShoulder,
        LandmarkId::LeftElbow,
        LandmarkId::LeftWrist,
    ),
    (
        "right_elbow",
        LandmarkId::RightShoulder,
        LandmarkId::RightElbow,
        LandmarkId::RightWrist,
    ),
    (
        "left_shoulder",
        LandmarkId::LeftElbow,
        LandmarkId::LeftShoulder,
        LandmarkId::LeftHip,
    ),
    (
        "right_shoulder",
        LandmarkId::RightElbow,
        LandmarkId::RightShoulder,
        LandmarkId::RightHip,
    ),
    (
        "left_hip",
        LandmarkId::LeftShoulder,
        LandmarkId::LeftHip,
        LandmarkId::LeftKnee,
    ),
    (
        "right_hip",
        LandmarkId::RightShoulder,
        LandmarkId::RightHip,
        LandmarkId::RightKnee,
    ),
    (
        "left_knee",
        LandmarkId::LeftHip,
        LandmarkId::LeftKnee,
        LandmarkId::LeftAnkle,
    ),
    (
        "right_knee",
        LandmarkId::RightHip,
        LandmarkId::RightKnee,
        LandmarkId::RightAnkle,
    ),
];

/// Find a landmark in a pose by identifier.
pub fn landmark_at(pose: &Pose, id: LandmarkId) -> Option<&Landmark> {
    pose.landmarks.iter().find(|lm| lm.id == id)
}

/// Angle in degrees at vertex `b` formed by rays b→a and b→c.
///
/// Returns `None` when either ray has near-zero magnitude, which would
/// otherwise divide by zero. The cosine is clamped to [-1, 1] before the
/// inverse cosine to guard against floating-point overshoot, so the result
/// is always in [0, 180].
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> Option<f64> {
    let ba = (a.x - b.x, a.y - b.y, a.z - b.z);
    let bc = (c.x - b.x, c.y - b.y, c.z - b.z);

    let mag_ba = (ba.0 * ba.0 + ba.1 * ba.1 + ba.2 * ba.2).sqrt();
    let mag_bc = (bc.0 * bc.0 + bc.1 * bc.1 + bc.2 * bc.2).sqrt();

    if mag_ba < MIN_VECTOR_MAGNITUDE || mag_bc < MIN_VECTOR_MAGNITUDE {
        return None;
    }

    let dot = ba.0 * bc.0 + ba.1 * bc.1 + ba.2 * bc.2;
    let cos_angle = (dot / (mag_ba * mag_bc)).clamp(-1.0, 1.0);

    Some(cos_angle.acos().to_degrees())
}

/// Compute the fixed set of 8 joint angles for a pose.
///
/// Joints whose landmark triple is incomplete or degenerate are omitted from
/// the result map entirely, never stored as a placeholder value.
pub fn all_joint_angles(pose: &Pose) -> HashMap<String, f64> {
    let mut angles = HashMap::new();

    for (name, a_id, b_id, c_id) in JOINT_TRIPLES {
        let triple = (
            landmark_at(pose, a_id),
            landmark_at(pose, b_id),
            landmark_at(pose, c_id),
        );
        if let (Some(a), Some(b), Some(c)) = triple {
            if let Some(angle) = joint_angle(a, b, c) {
                angles.insert(name.to_string(), angle);
            }
        }
    }

    angles
}

/// Check that a value is a plausible joint angle.
///
/// Self-check helper for tests and validation; never used to silently
/// correct a computed angle.
pub fn is_valid_angle(degrees: f64) -> bool {
    degrees.is_finite() && (0.0..=180.0).contains(&degrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(id: LandmarkId, x: f64, y: f64, z: f64) -> Landmark {
        Landmark::new(id, x, y, z, 1.0)
    }

    #[test]
    fn straight_line_is_180_degrees() {
        let a = lm(LandmarkId::LeftShoulder, 0.0, 0.0, 0.0);
        let b = lm(LandmarkId::LeftElbow, 0.0, 1.0, 0.0);
        let c = lm(LandmarkId::LeftWrist, 0.0, 2.0, 0.0);
        let angle = joint_angle(&a, &b, &c).unwrap();
        assert!((angle - 180.0).abs() < 0.5);
    }

    #[test]
    fn right_angle_is_90_degrees() {
        let a = lm(LandmarkId::LeftShoulder, 0.0, 0.0, 0.0);
        let b = lm(LandmarkId::LeftElbow, 0.0, 10.0, 0.0);
        let c = lm(LandmarkId::LeftWrist, 10.0, 10.0, 0.0);
        let angle = joint_angle(&a, &b, &c).unwrap();
        assert!((angle - 90.0).abs() < 0.5);
    }

    #[test]
    fn coincident_landmarks_yield_no_angle() {
        let a = lm(LandmarkId::LeftShoulder, 1.0, 1.0, 1.0);
        let b = lm(LandmarkId::LeftElbow, 1.0, 1.0, 1.0);
        let c = lm(LandmarkId::LeftWrist, 2.0, 2.0, 2.0);
        assert!(joint_angle(&a, &b, &c).is_none());
    }

    #[test]
    fn angle_never_exceeds_valid_range() {
        // Near-collinear points can overshoot cos = -1 without the clamp
        let a = lm(LandmarkId::LeftShoulder, 0.0, 0.0, 0.0);
        let b = lm(LandmarkId::LeftElbow, 1.0, 1.0, 1.0);
        let c = lm(LandmarkId::LeftWrist, 2.0, 2.0, 2.0000001);
        let angle = joint_angle(&a, &b, &c).unwrap();
        assert!(is_valid_angle(angle));
    }

    #[test]
    fn incomplete_triples_are_omitted_from_angle_map() {
        // Only the left arm is present, so only left_elbow can resolve
        let pose = Pose::new(
            vec![
                lm(LandmarkId::LeftShoulder, 0.0, 0.0, 0.0),
                lm(LandmarkId::LeftElbow, 0.0, 1.0, 0.0),
                lm(LandmarkId::LeftWrist, 1.0, 1.0, 0.0),
            ],
            1.0,
            0,
        );
        let angles = all_joint_angles(&pose);
        assert_eq!(angles.len(), 1);
        assert!(angles.contains_key("left_elbow"));
        assert!(!angles.contains_key("right_elbow"));
    }

    #[test]
    fn full_pose_resolves_all_eight_joints() {
        let mut landmarks = Vec::new();
        // Spread landmarks so no triple is degenerate
        for (i, id) in LandmarkId::ALL.iter().enumerate() {
            let i = i as f64;
            landmarks.push(lm(*id, i * 0.1, (i * 0.07).sin(), i * 0.03));
        }
        let pose = Pose::new(landmarks, 1.0, 0);
        let angles = all_joint_angles(&pose);
        assert_eq!(angles.len(), 8);
        for angle in angles.values() {
            assert!(is_valid_angle(*angle));
        }
    }

    #[test]
    fn landmark_lookup_by_id() {
        let pose = Pose::new(vec![lm(LandmarkId::Nose, 0.5, 0.2, 0.0)], 1.0, 0);
        assert!(landmark_at(&pose, LandmarkId::Nose).is_some());
        assert!(landmark_at(&pose, LandmarkId::LeftHip).is_none());
    }

    #[test]
    fn angle_validation_rejects_bad_values() {
        assert!(!is_valid_angle(f64::NAN));
        assert!(!is_valid_angle(f64::INFINITY));
        assert!(!is_valid_angle(-1.0));
        assert!(!is_valid_angle(180.5));
        assert!(is_valid_angle(0.0));
        assert!(is_valid_angle(180.0));
    }
}
