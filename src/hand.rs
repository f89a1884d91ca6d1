//! Hands as reported by a landmark provider.
//!
//! A [`Hand`] is a plain list of pixel keypoints in the coordinate system of the (mirrored) frame
//! it was detected in. It lives for one frame only.

pub mod detection;
pub mod fingers;
pub mod landmark;
pub mod provider;

/// Number of landmarks in a complete hand.
pub const NUM_LANDMARKS: usize = 21;

/// A 2D pixel coordinate of a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
}

impl Keypoint {
    #[inline]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for Keypoint {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Which hand the provider thinks it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand.
///
/// The keypoint count is not checked on construction. Consumers that index into the keypoints
/// (like [`fingers::FingerClassifier`]) validate it themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hand {
    keypoints: Vec<Keypoint>,
    handedness: Option<Handedness>,
}

impl Hand {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            handedness: None,
        }
    }

    #[must_use]
    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = Some(handedness);
        self
    }

    #[inline]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Returns the keypoint at `index`, or [`None`] if the hand has fewer keypoints.
    #[inline]
    pub fn keypoint(&self, index: usize) -> Option<Keypoint> {
        self.keypoints.get(index).copied()
    }

    #[inline]
    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

impl FromIterator<Keypoint> for Hand {
    fn from_iter<T: IntoIterator<Item = Keypoint>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Names for the hand landmarks, in model output order.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the knuckle joint near the palm.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **IP**: Interphalangeal joint of the thumb.
/// - **Tip**: The tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Bone connections of the hand skeleton, as keypoint index pairs.
pub const CONNECTIVITY: &[(usize, usize)] = {
    use LandmarkIdx::*;
    &[
        // Palm:
        (Wrist as usize, ThumbCmc as usize),
        (ThumbCmc as usize, IndexFingerMcp as usize),
        (IndexFingerMcp as usize, MiddleFingerMcp as usize),
        (MiddleFingerMcp as usize, RingFingerMcp as usize),
        (RingFingerMcp as usize, PinkyMcp as usize),
        (PinkyMcp as usize, Wrist as usize),
        // Thumb:
        (ThumbCmc as usize, ThumbMcp as usize),
        (ThumbMcp as usize, ThumbIp as usize),
        (ThumbIp as usize, ThumbTip as usize),
        // Index:
        (IndexFingerMcp as usize, IndexFingerPip as usize),
        (IndexFingerPip as usize, IndexFingerDip as usize),
        (IndexFingerDip as usize, IndexFingerTip as usize),
        // Middle:
        (MiddleFingerMcp as usize, MiddleFingerPip as usize),
        (MiddleFingerPip as usize, MiddleFingerDip as usize),
        (MiddleFingerDip as usize, MiddleFingerTip as usize),
        // Ring:
        (RingFingerMcp as usize, RingFingerPip as usize),
        (RingFingerPip as usize, RingFingerDip as usize),
        (RingFingerDip as usize, RingFingerTip as usize),
        // Pinky:
        (PinkyMcp as usize, PinkyPip as usize),
        (PinkyPip as usize, PinkyDip as usize),
        (PinkyDip as usize, PinkyTip as usize),
    ]
};
