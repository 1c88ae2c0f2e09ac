//! Fundamental types for the FormCoach system.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of joint angles tracked per frame
pub const ANGLE_DIMS: usize = Joint::COUNT;

/// One frame worth of joint angles (degrees), indexed by [`Joint`]
pub type AngleVector = [f64; ANGLE_DIMS];

/// Time-ordered joint angles, one vector per retained frame
pub type AngleSequence = Vec<AngleVector>;

/// Live coaching session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * 1_000_000_000.0) as i64)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Seconds elapsed since `earlier` (negative if `earlier` is in the future)
    pub fn secs_since(&self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0) as f64 / 1_000_000_000.0
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }
}

/// Normalized image-space landmark position.
///
/// `x` and `y` lie in [0, 1] when the point is inside the camera frame; `z` is
/// the relative depth reported by the pose estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Image-plane projection (z dropped)
    pub fn to_planar_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Whether the point projects inside the normalized camera frame
    pub fn in_frame(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        Self::new(
            0.5 * (self.x + other.x),
            0.5 * (self.y + other.y),
            0.5 * (self.z + other.z),
        )
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }
}

impl From<[f64; 3]> for Landmark {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// 33-landmark body topology (BlazePose / MediaPipe Pose ordering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        use PoseLandmark::*;
        const ALL: [PoseLandmark; PoseLandmark::COUNT] = [
            Nose,
            LeftEyeInner,
            LeftEye,
            LeftEyeOuter,
            RightEyeInner,
            RightEye,
            RightEyeOuter,
            LeftEar,
            RightEar,
            MouthLeft,
            MouthRight,
            LeftShoulder,
            RightShoulder,
            LeftElbow,
            RightElbow,
            LeftWrist,
            RightWrist,
            LeftPinky,
            RightPinky,
            LeftIndex,
            RightIndex,
            LeftThumb,
            RightThumb,
            LeftHip,
            RightHip,
            LeftKnee,
            RightKnee,
            LeftAnkle,
            RightAnkle,
            LeftHeel,
            RightHeel,
            LeftFootIndex,
            RightFootIndex,
        ];
        ALL.get(idx as usize).copied()
    }
}

/// One frame of detected body landmarks.
///
/// A complete frame carries [`PoseLandmark::COUNT`] points. Frames where the
/// pose estimator found nobody are represented as `None` by the sources, never
/// as an empty `PoseFrame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub timestamp: Timestamp,
    pub landmarks: Vec<Landmark>,
}

impl PoseFrame {
    pub fn new(timestamp: Timestamp, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp,
            landmarks,
        }
    }

    pub fn from_xyz(timestamp: Timestamp, points: &[[f64; 3]]) -> Self {
        Self::new(timestamp, points.iter().copied().map(Landmark::from).collect())
    }

    /// Landmark lookup; `None` when missing or non-finite
    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        self.landmarks
            .get(landmark.index())
            .filter(|lm| lm.is_finite())
    }

    pub fn is_complete(&self) -> bool {
        self.landmarks.len() == PoseLandmark::COUNT
    }
}

/// Body side of a paired joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Joint families; each family has a left and a right member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointFamily {
    Elbow,
    Shoulder,
    Hip,
    Knee,
}

impl JointFamily {
    pub const ALL: [JointFamily; 4] = [
        JointFamily::Elbow,
        JointFamily::Shoulder,
        JointFamily::Hip,
        JointFamily::Knee,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            JointFamily::Elbow => "elbow",
            JointFamily::Shoulder => "shoulder",
            JointFamily::Hip => "hip",
            JointFamily::Knee => "knee",
        }
    }

    pub fn joints(&self) -> [Joint; 2] {
        match self {
            JointFamily::Elbow => [Joint::ElbowL, Joint::ElbowR],
            JointFamily::Shoulder => [Joint::ShoulderL, Joint::ShoulderR],
            JointFamily::Hip => [Joint::HipL, Joint::HipR],
            JointFamily::Knee => [Joint::KneeL, Joint::KneeR],
        }
    }
}

/// The eight tracked joint angles.
///
/// The discriminant is the column index of the joint in every [`AngleVector`];
/// all components index angle data through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Joint {
    ElbowL = 0,
    ElbowR = 1,
    ShoulderL = 2,
    ShoulderR = 3,
    HipL = 4,
    HipR = 5,
    KneeL = 6,
    KneeR = 7,
}

impl Joint {
    pub const COUNT: usize = 8;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::ElbowL,
        Joint::ElbowR,
        Joint::ShoulderL,
        Joint::ShoulderR,
        Joint::HipL,
        Joint::HipR,
        Joint::KneeL,
        Joint::KneeR,
    ];

    /// Hinge joints considered when picking the template's segmentation channel
    pub const HINGES: [Joint; 4] = [Joint::ElbowL, Joint::ElbowR, Joint::KneeL, Joint::KneeR];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|j| j.token() == token)
    }

    pub fn token(&self) -> &'static str {
        match self {
            Joint::ElbowL => "elbow_l",
            Joint::ElbowR => "elbow_r",
            Joint::ShoulderL => "shoulder_l",
            Joint::ShoulderR => "shoulder_r",
            Joint::HipL => "hip_l",
            Joint::HipR => "hip_r",
            Joint::KneeL => "knee_l",
            Joint::KneeR => "knee_r",
        }
    }

    /// Human-readable name used in coaching messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Joint::ElbowL => "left elbow",
            Joint::ElbowR => "right elbow",
            Joint::ShoulderL => "left shoulder",
            Joint::ShoulderR => "right shoulder",
            Joint::HipL => "left hip",
            Joint::HipR => "right hip",
            Joint::KneeL => "left knee",
            Joint::KneeR => "right knee",
        }
    }

    pub fn family(&self) -> JointFamily {
        match self {
            Joint::ElbowL | Joint::ElbowR => JointFamily::Elbow,
            Joint::ShoulderL | Joint::ShoulderR => JointFamily::Shoulder,
            Joint::HipL | Joint::HipR => JointFamily::Hip,
            Joint::KneeL | Joint::KneeR => JointFamily::Knee,
        }
    }

    pub fn side(&self) -> Side {
        if self.index() % 2 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// The same joint on the opposite side of the body
    pub fn mirrored(&self) -> Joint {
        Self::ALL[self.index() ^ 1]
    }

    /// Landmark triple `(a, b, c)`; the angle is measured at `b`
    pub fn landmarks(&self) -> (PoseLandmark, PoseLandmark, PoseLandmark) {
        use PoseLandmark::*;
        match self {
            Joint::ElbowL => (LeftShoulder, LeftElbow, LeftWrist),
            Joint::ElbowR => (RightShoulder, RightElbow, RightWrist),
            Joint::ShoulderL => (LeftElbow, LeftShoulder, LeftHip),
            Joint::ShoulderR => (RightElbow, RightShoulder, RightHip),
            Joint::HipL => (LeftShoulder, LeftHip, LeftKnee),
            Joint::HipR => (RightShoulder, RightHip, RightKnee),
            Joint::KneeL => (LeftHip, LeftKnee, LeftAnkle),
            Joint::KneeR => (RightHip, RightKnee, RightAnkle),
        }
    }
}

impl std::fmt::Display for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// One movement cycle as a closed index range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepSegment {
    pub start: usize,
    pub end: usize,
}

impl RepSegment {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of index steps spanned by the cycle
    pub fn duration(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Number of samples covered (inclusive range)
    pub fn sample_count(&self) -> usize {
        self.duration() + 1
    }
}
