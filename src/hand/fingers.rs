//! Counting extended fingers.
//!
//! The [`FingerClassifier`] decides for each digit whether it is extended by comparing the
//! position of its tip with a reference joint:
//!
//! - **Thumb**: extended if the tip is strictly *right* of its joint (`tip.x > joint.x`). This
//!   assumes a mirrored frame and an upright hand.
//! - **Other fingers**: extended if the tip is strictly *above* its joint (`tip.y < joint.y`, as
//!   image y grows downwards).
//!
//! Ties count as not extended. The rules are heuristics for upright hands facing the camera; they
//! do not estimate any 3D joint angles.
//!
//! Which keypoints are used is configured with a [`FingerTable`], so that other hand topologies
//! can be plugged in.

use std::fmt;

use thiserror::Error;

use super::{Hand, Keypoint, LandmarkIdx, NUM_LANDMARKS};

/// Errors returned by [`FingerTable::new`] and [`FingerClassifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerError {
    /// The hand does not have the number of keypoints the table was built for.
    #[error("malformed hand: expected {expected} keypoints, got {actual}")]
    MalformedHand { expected: usize, actual: usize },

    /// A table entry refers to a keypoint that does not exist.
    #[error("keypoint index {index} is out of range for a hand with {keypoint_count} keypoints")]
    IndexOutOfRange {
        index: usize,
        keypoint_count: usize,
    },
}

/// The five digits of a hand, in [`FingerTable`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Digit {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Digit {
    pub const ALL: [Digit; 5] = [
        Digit::Thumb,
        Digit::Index,
        Digit::Middle,
        Digit::Ring,
        Digit::Pinky,
    ];
}

/// `(tip, joint)` keypoint indices for every [`Digit`], plus the keypoint count of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerTable {
    keypoint_count: usize,
    pairs: [(usize, usize); 5],
}

impl FingerTable {
    /// The 21-landmark hand topology used by the bundled landmark network.
    ///
    /// The thumb is compared against its IP joint, all other fingers against their PIP joint.
    pub const MEDIAPIPE: Self = {
        use LandmarkIdx::*;
        Self {
            keypoint_count: NUM_LANDMARKS,
            pairs: [
                (ThumbTip as usize, ThumbIp as usize),
                (IndexFingerTip as usize, IndexFingerPip as usize),
                (MiddleFingerTip as usize, MiddleFingerPip as usize),
                (RingFingerTip as usize, RingFingerPip as usize),
                (PinkyTip as usize, PinkyPip as usize),
            ],
        }
    };

    /// Creates a table for hands with `keypoint_count` keypoints.
    ///
    /// `pairs` lists `(tip, joint)` for thumb, index, middle, ring and pinky, in that order. Every
    /// index must be less than `keypoint_count`.
    pub fn new(keypoint_count: usize, pairs: [(usize, usize); 5]) -> Result<Self, FingerError> {
        if let Some(&index) = pairs
            .iter()
            .flat_map(|(tip, joint)| [tip, joint])
            .find(|&&index| index >= keypoint_count)
        {
            return Err(FingerError::IndexOutOfRange {
                index,
                keypoint_count,
            });
        }

        Ok(Self {
            keypoint_count,
            pairs,
        })
    }

    /// Returns the `(tip, joint)` indices of `digit`.
    #[inline]
    pub fn pair(&self, digit: Digit) -> (usize, usize) {
        self.pairs[digit as usize]
    }
}

impl Default for FingerTable {
    fn default() -> Self {
        Self::MEDIAPIPE
    }
}

/// Per-digit classification of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extended([bool; 5]);

impl Extended {
    #[inline]
    pub fn is_extended(&self, digit: Digit) -> bool {
        self.0[digit as usize]
    }

    /// Returns an iterator over the extended digits.
    pub fn digits(&self) -> impl Iterator<Item = Digit> + '_ {
        Digit::ALL
            .into_iter()
            .filter(|&digit| self.is_extended(digit))
    }

    pub fn count(&self) -> FingerCount {
        FingerCount(self.0.iter().filter(|&&up| up).count() as u8)
    }
}

/// Number of extended fingers of one hand, in `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FingerCount(u8);

impl FingerCount {
    pub const MAX: Self = Self(5);

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<FingerCount> for u32 {
    fn from(count: FingerCount) -> u32 {
        u32::from(count.0)
    }
}

impl fmt::Display for FingerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Classifies the digits of a single hand.
///
/// Holds only its immutable [`FingerTable`]; every call is independent of previous ones.
#[derive(Debug, Clone, Default)]
pub struct FingerClassifier {
    table: FingerTable,
}

impl FingerClassifier {
    pub fn new(table: FingerTable) -> Self {
        Self { table }
    }

    /// Determines which digits of `hand` are extended.
    ///
    /// Returns [`FingerError::MalformedHand`] if `hand` does not have exactly as many keypoints as
    /// the table expects.
    pub fn extended(&self, hand: &Hand) -> Result<Extended, FingerError> {
        let keypoints = hand.keypoints();
        if keypoints.len() != self.table.keypoint_count {
            return Err(FingerError::MalformedHand {
                expected: self.table.keypoint_count,
                actual: keypoints.len(),
            });
        }

        // All indices are `< keypoint_count == keypoints.len()`, checked by `FingerTable::new`.
        Ok(Extended(Digit::ALL.map(|digit| {
            let (tip, joint) = self.table.pair(digit);
            is_extended(digit, keypoints[tip], keypoints[joint])
        })))
    }

    /// Counts the extended digits of `hand`.
    pub fn classify(&self, hand: &Hand) -> Result<FingerCount, FingerError> {
        self.extended(hand).map(|extended| extended.count())
    }
}

fn is_extended(digit: Digit, tip: Keypoint, joint: Keypoint) -> bool {
    match digit {
        Digit::Thumb => tip.x > joint.x,
        Digit::Index | Digit::Middle | Digit::Ring | Digit::Pinky => tip.y < joint.y,
    }
}
