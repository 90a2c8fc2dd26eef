//! Feature extraction
//!
//! Turns a pose timeline into the scalar time series and averaged spatial
//! features consumed by the downstream analyzers:
//! - Visibility-filtered landmark averaging (noise reduction)
//! - Torso motion signal (the breathing proxy)
//! - Per-landmark velocities, center of mass, support polygon
//! - Head/shoulder alignment

use crate::types::{Landmark, LandmarkId, Point3, Timeline};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Landmarks below this visibility are ignored when averaging (0-1)
    pub visibility_cutoff: f64,
    /// Window for moving-average smoothing (frames)
    pub smoothing_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            visibility_cutoff: 0.5,
            smoothing_window: 5,
        }
    }
}

/// Head position relative to the shoulder line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadShoulderAlignment {
    /// Depth-axis offset of the nose from the shoulder midpoint
    pub forward_head_distance: f64,
    /// Vertical difference between the two shoulder landmarks (left minus right)
    pub shoulder_height_diff: f64,
}

/// The four torso landmarks whose centroid tracks breathing motion.
const TORSO_LANDMARKS: [LandmarkId; 4] = [
    LandmarkId::LeftShoulder,
    LandmarkId::RightShoulder,
    LandmarkId::LeftHip,
    LandmarkId::RightHip,
];

/// Landmarks forming the support polygon when present.
const FOOT_LANDMARKS: [LandmarkId; 4] = [
    LandmarkId::LeftHeel,
    LandmarkId::RightHeel,
    LandmarkId::LeftFootIndex,
    LandmarkId::RightFootIndex,
];

/// Arithmetic mean of a set of points. The centroid of an empty set is
/// defined as the origin, not an error.
pub fn centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::ORIGIN;
    }
    let n = points.len() as f64;
    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for p in points {
        x += p.x;
        y += p.y;
        z += p.z;
    }
    Point3::new(x / n, y / n, z / n)
}

/// Average each landmark's position and visibility over all frames where its
/// visibility meets the cutoff. Landmarks with no qualifying samples are
/// omitted.
pub fn averaged_landmarks(
    timeline: &Timeline,
    visibility_cutoff: f64,
) -> HashMap<LandmarkId, Landmark> {
    let mut sums: HashMap<LandmarkId, (f64, f64, f64, f64, usize)> = HashMap::new();

    for frame in timeline.frames() {
        for lm in &frame.pose.landmarks {
            if lm.visibility < visibility_cutoff {
                continue;
            }
            let entry = sums.entry(lm.id).or_insert((0.0, 0.0, 0.0, 0.0, 0));
            entry.0 += lm.x;
            entry.1 += lm.y;
            entry.2 += lm.z;
            entry.3 += lm.visibility;
            entry.4 += 1;
        }
    }

    sums.into_iter()
        .map(|(id, (x, y, z, vis, count))| {
            let n = count as f64;
            (id, Landmark::new(id, x / n, y / n, z / n, vis / n))
        })
        .collect()
}

/// Frame-to-frame displacement of the torso centroid, one value per frame.
///
/// The first frame has no predecessor, so its value is defined as 0. This
/// raw distance sequence is the input to the breathing analyzer.
pub fn torso_motion_signal(timeline: &Timeline, visibility_cutoff: f64) -> Vec<f64> {
    let centroids: Vec<Point3> = timeline
        .frames()
        .iter()
        .map(|frame| {
            let points: Vec<Point3> = frame
                .pose
                .landmarks
                .iter()
                .filter(|lm| TORSO_LANDMARKS.contains(&lm.id) && lm.visibility >= visibility_cutoff)
                .map(|lm| lm.position())
                .collect();
            centroid(&points)
        })
        .collect();

    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                0.0
            } else {
                centroids[i - 1].distance_to(c)
            }
        })
        .collect()
}

/// Frame-to-frame position deltas for each requested landmark.
///
/// The first frame's delta is the zero vector. Frames where the landmark is
/// missing contribute the zero vector as well.
pub fn velocities(timeline: &Timeline, ids: &[LandmarkId]) -> HashMap<LandmarkId, Vec<Point3>> {
    let mut out: HashMap<LandmarkId, Vec<Point3>> = HashMap::new();

    for id in ids {
        let positions: Vec<Option<Point3>> = timeline
            .frames()
            .iter()
            .map(|frame| {
                frame
                    .pose
                    .landmarks
                    .iter()
                    .find(|lm| lm.id == *id)
                    .map(|lm| lm.position())
            })
            .collect();

        let deltas: Vec<Point3> = positions
            .iter()
            .enumerate()
            .map(|(i, pos)| {
                if i == 0 {
                    return Point3::ORIGIN;
                }
                match (positions[i - 1], pos) {
                    (Some(prev), Some(curr)) => {
                        Point3::new(curr.x - prev.x, curr.y - prev.y, curr.z - prev.z)
                    }
                    _ => Point3::ORIGIN,
                }
            })
            .collect();

        out.insert(*id, deltas);
    }

    out
}

/// Weighted whole-body center of mass over whichever segments are available.
///
/// Segment weights: head 8%, torso 50%, each arm 5%, each leg 16%. Missing
/// segments are dropped and the remaining weights renormalized. Returns
/// `None` when no weighted segment position is available.
pub fn center_of_mass(averaged: &HashMap<LandmarkId, Landmark>) -> Option<Point3> {
    let pos = |id: LandmarkId| averaged.get(&id).map(|lm| lm.position());

    let segment_centroid = |ids: &[LandmarkId]| -> Option<Point3> {
        let points: Vec<Point3> = ids.iter().filter_map(|id| pos(*id)).collect();
        if points.is_empty() {
            None
        } else {
            Some(centroid(&points))
        }
    };

    let segments: [(Option<Point3>, f64); 6] = [
        (pos(LandmarkId::Nose), 0.08),
        (segment_centroid(&TORSO_LANDMARKS), 0.50),
        (
            segment_centroid(&[LandmarkId::LeftElbow, LandmarkId::LeftWrist]),
            0.05,
        ),
        (
            segment_centroid(&[LandmarkId::RightElbow, LandmarkId::RightWrist]),
            0.05,
        ),
        (
            segment_centroid(&[LandmarkId::LeftKnee, LandmarkId::LeftAnkle]),
            0.16,
        ),
        (
            segment_centroid(&[LandmarkId::RightKnee, LandmarkId::RightAnkle]),
            0.16,
        ),
    ];

    let (mut x, mut y, mut z, mut total_weight) = (0.0, 0.0, 0.0, 0.0);
    for (point, weight) in segments {
        if let Some(p) = point {
            x += p.x * weight;
            y += p.y * weight;
            z += p.z * weight;
            total_weight += weight;
        }
    }

    if total_weight == 0.0 {
        return None;
    }
    Some(Point3::new(x / total_weight, y / total_weight, z / total_weight))
}

/// Foot contact points (heels and foot indices) present in the averaged
/// landmark set. Order is not significant.
pub fn support_polygon(averaged: &HashMap<LandmarkId, Landmark>) -> Vec<Point3> {
    FOOT_LANDMARKS
        .iter()
        .filter_map(|id| averaged.get(id).map(|lm| lm.position()))
        .collect()
}

/// Head position relative to the shoulder line. Requires the nose and both
/// shoulders; returns `None` otherwise.
pub fn head_shoulder_alignment(
    averaged: &HashMap<LandmarkId, Landmark>,
) -> Option<HeadShoulderAlignment> {
    let nose = averaged.get(&LandmarkId::Nose)?;
    let left = averaged.get(&LandmarkId::LeftShoulder)?;
    let right = averaged.get(&LandmarkId::RightShoulder)?;

    let mid_z = (left.z + right.z) / 2.0;

    Some(HeadShoulderAlignment {
        forward_head_distance: nose.z - mid_z,
        shoulder_height_diff: left.y - right.y,
    })
}

/// Centered moving average over a signal. Values near the edges average over
/// the samples that exist. Returns the input unchanged for window <= 1.
pub fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || signal.is_empty() {
        return signal.to_vec();
    }
    let half = window / 2;
    (0..signal.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(signal.len());
            let slice = &signal[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// All per-timeline features, computed once and shared by every downstream
/// analyzer. Landmark averaging is the single most expensive step, so it
/// must not be repeated per consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Visibility-filtered average position per landmark
    pub averaged: HashMap<LandmarkId, Landmark>,
    /// Frame-to-frame torso centroid displacement
    pub torso_motion: Vec<f64>,
    /// Whole-body center of mass, when enough segments are visible
    pub center_of_mass: Option<Point3>,
    /// Foot contact points
    pub support_polygon: Vec<Point3>,
    /// Head/shoulder alignment, when nose and shoulders are visible
    pub alignment: Option<HeadShoulderAlignment>,
}

impl FeatureSet {
    /// Extract the full feature bundle for a timeline.
    pub fn extract(timeline: &Timeline, config: &FeatureConfig) -> Self {
        let averaged = averaged_landmarks(timeline, config.visibility_cutoff);
        let torso_motion = torso_motion_signal(timeline, config.visibility_cutoff);
        let center_of_mass = center_of_mass(&averaged);
        let support_polygon = support_polygon(&averaged);
        let alignment = head_shoulder_alignment(&averaged);

        Self {
            averaged,
            torso_motion,
            center_of_mass,
            support_polygon,
            alignment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frame, Pose};

    fn lm(id: LandmarkId, x: f64, y: f64, z: f64, visibility: f64) -> Landmark {
        Landmark::new(id, x, y, z, visibility)
    }

    fn timeline_from_poses(poses: Vec<Vec<Landmark>>) -> Timeline {
        let mut timeline = Timeline::new();
        for (i, landmarks) in poses.into_iter().enumerate() {
            let ts = i as i64 * 66;
            timeline.push(Frame::new(i, ts, Pose::new(landmarks, 1.0, ts)));
        }
        timeline
    }

    #[test]
    fn centroid_of_empty_set_is_origin() {
        assert_eq!(centroid(&[]), Point3::ORIGIN);
    }

    #[test]
    fn centroid_is_arithmetic_mean() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)];
        let c = centroid(&points);
        assert_eq!(c, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn averaging_skips_low_visibility_samples() {
        let timeline = timeline_from_poses(vec![
            vec![lm(LandmarkId::Nose, 1.0, 1.0, 1.0, 0.9)],
            // Low-visibility outlier that must not pollute the average
            vec![lm(LandmarkId::Nose, 100.0, 100.0, 100.0, 0.1)],
            vec![lm(LandmarkId::Nose, 3.0, 3.0, 3.0, 0.9)],
        ]);
        let averaged = averaged_landmarks(&timeline, 0.5);
        let nose = averaged.get(&LandmarkId::Nose).unwrap();
        assert!((nose.x - 2.0).abs() < 1e-12);
        assert!((nose.visibility - 0.9).abs() < 1e-12);
    }

    #[test]
    fn landmarks_without_qualifying_samples_are_omitted() {
        let timeline = timeline_from_poses(vec![vec![
            lm(LandmarkId::Nose, 1.0, 1.0, 1.0, 0.9),
            lm(LandmarkId::LeftWrist, 1.0, 1.0, 1.0, 0.2),
        ]]);
        let averaged = averaged_landmarks(&timeline, 0.5);
        assert!(averaged.contains_key(&LandmarkId::Nose));
        assert!(!averaged.contains_key(&LandmarkId::LeftWrist));
    }

    fn torso_at(y: f64) -> Vec<Landmark> {
        vec![
            lm(LandmarkId::LeftShoulder, 0.0, y, 0.0, 0.9),
            lm(LandmarkId::RightShoulder, 1.0, y, 0.0, 0.9),
            lm(LandmarkId::LeftHip, 0.0, y + 1.0, 0.0, 0.9),
            lm(LandmarkId::RightHip, 1.0, y + 1.0, 0.0, 0.9),
        ]
    }

    #[test]
    fn torso_motion_first_frame_is_zero() {
        let timeline = timeline_from_poses(vec![torso_at(0.0), torso_at(0.1), torso_at(0.3)]);
        let signal = torso_motion_signal(&timeline, 0.5);
        assert_eq!(signal.len(), 3);
        assert_eq!(signal[0], 0.0);
        assert!((signal[1] - 0.1).abs() < 1e-9);
        assert!((signal[2] - 0.2).abs() < 1e-9);
    }

    #[test]
    fn velocities_first_frame_is_zero_vector() {
        let timeline = timeline_from_poses(vec![
            vec![lm(LandmarkId::LeftWrist, 0.0, 0.0, 0.0, 0.9)],
            vec![lm(LandmarkId::LeftWrist, 1.0, 2.0, 3.0, 0.9)],
        ]);
        let v = velocities(&timeline, &[LandmarkId::LeftWrist]);
        let deltas = v.get(&LandmarkId::LeftWrist).unwrap();
        assert_eq!(deltas[0], Point3::ORIGIN);
        assert_eq!(deltas[1], Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn center_of_mass_requires_at_least_one_segment() {
        let empty: HashMap<LandmarkId, Landmark> = HashMap::new();
        assert!(center_of_mass(&empty).is_none());

        let mut torso_only = HashMap::new();
        for id in [
            LandmarkId::LeftShoulder,
            LandmarkId::RightShoulder,
            LandmarkId::LeftHip,
            LandmarkId::RightHip,
        ] {
            torso_only.insert(id, lm(id, 0.5, 0.5, 0.0, 0.9));
        }
        let com = center_of_mass(&torso_only).unwrap();
        // Torso is the only segment, so COM collapses onto its centroid
        assert!((com.x - 0.5).abs() < 1e-12);
        assert!((com.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn support_polygon_collects_present_feet() {
        let mut averaged = HashMap::new();
        averaged.insert(
            LandmarkId::LeftHeel,
            lm(LandmarkId::LeftHeel, 0.0, 1.0, 0.0, 0.9),
        );
        averaged.insert(
            LandmarkId::RightFootIndex,
            lm(LandmarkId::RightFootIndex, 1.0, 1.0, 0.2, 0.9),
        );
        assert_eq!(support_polygon(&averaged).len(), 2);
    }

    #[test]
    fn alignment_requires_nose_and_both_shoulders() {
        let mut averaged = HashMap::new();
        averaged.insert(LandmarkId::Nose, lm(LandmarkId::Nose, 0.5, 0.1, -0.2, 0.9));
        averaged.insert(
            LandmarkId::LeftShoulder,
            lm(LandmarkId::LeftShoulder, 0.3, 0.35, 0.0, 0.9),
        );
        assert!(head_shoulder_alignment(&averaged).is_none());

        averaged.insert(
            LandmarkId::RightShoulder,
            lm(LandmarkId::RightShoulder, 0.7, 0.3, 0.0, 0.9),
        );
        let alignment = head_shoulder_alignment(&averaged).unwrap();
        assert!((alignment.forward_head_distance - (-0.2)).abs() < 1e-12);
        assert!((alignment.shoulder_height_diff - 0.05).abs() < 1e-12);
    }

    #[test]
    fn moving_average_smooths_a_spike() {
        let signal = vec![0.0, 0.0, 10.0, 0.0, 0.0];
        let smoothed = moving_average(&signal, 5);
        assert_eq!(smoothed.len(), 5);
        assert!(smoothed[2] < 10.0);
        assert!(smoothed[2] > 0.0);
    }

    #[test]
    fn feature_set_bundles_all_features() {
        let mut pose = torso_at(0.3);
        pose.push(lm(LandmarkId::Nose, 0.5, 0.1, -0.1, 0.9));
        let timeline = timeline_from_poses(vec![pose.clone(), pose]);
        let features = FeatureSet::extract(&timeline, &FeatureConfig::default());

        assert_eq!(features.torso_motion.len(), 2);
        assert!(features.averaged.contains_key(&LandmarkId::Nose));
        assert!(features.center_of_mass.is_some());
        assert!(features.alignment.is_some());
    }
}
