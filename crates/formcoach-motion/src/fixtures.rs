//! Synthetic curl recordings for tests.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for dependants' test suites.

use formcoach_core::{Landmark, PoseFrame, PoseLandmark, Timestamp};

/// Front-facing figure with the left elbow bent to `elbow_deg` degrees
pub fn arm_frame(ts_secs: f64, elbow_deg: f64) -> PoseFrame {
    let mut points = vec![[0.5, 0.5, 0.0]; PoseLandmark::COUNT];
    let mut set = |lm: PoseLandmark, x: f64, y: f64| points[lm.index()] = [x, y, 0.0];
    set(PoseLandmark::LeftShoulder, 0.6, 0.3);
    set(PoseLandmark::RightShoulder, 0.4, 0.3);
    set(PoseLandmark::LeftHip, 0.6, 0.6);
    set(PoseLandmark::RightHip, 0.4, 0.6);
    set(PoseLandmark::LeftKnee, 0.6, 0.75);
    set(PoseLandmark::RightKnee, 0.4, 0.75);
    set(PoseLandmark::LeftAnkle, 0.6, 0.9);
    set(PoseLandmark::RightAnkle, 0.4, 0.9);
    set(PoseLandmark::RightElbow, 0.4, 0.4);
    set(PoseLandmark::RightWrist, 0.4, 0.5);
    set(PoseLandmark::LeftElbow, 0.6, 0.4);

    // Forearm rotated away from the upper arm, which points down the image
    let theta = elbow_deg.to_radians();
    let mut frame = PoseFrame::from_xyz(Timestamp::from_secs_f64(ts_secs), &points);
    frame.landmarks[PoseLandmark::LeftWrist.index()] =
        Landmark::new(0.6 + 0.1 * theta.sin(), 0.4 - 0.1 * theta.cos(), 0.0);
    frame
}

/// Linear curl profile: 160° → 40° → 160° over one period
pub fn curl_angle(phase: f64) -> f64 {
    let tri = if phase < 0.5 {
        2.0 * phase
    } else {
        2.0 * (1.0 - phase)
    };
    160.0 - 120.0 * tri
}

/// Curl recording with the given period in frames
pub fn curl_frames(n: usize, period: usize, fps: f64) -> Vec<PoseFrame> {
    (0..n)
        .map(|i| curl_frame(i, period, fps))
        .collect()
}

pub fn curl_frame(i: usize, period: usize, fps: f64) -> PoseFrame {
    let phase = (i % period) as f64 / period as f64;
    arm_frame(i as f64 / fps, curl_angle(phase))
}

/// Same pose seen from behind: x mirrored about the image center
pub fn turned_around(frame: &PoseFrame) -> PoseFrame {
    let landmarks = frame
        .landmarks
        .iter()
        .map(|lm| Landmark::new(1.0 - lm.x, lm.y, lm.z))
        .collect();
    PoseFrame::new(frame.timestamp, landmarks)
}
