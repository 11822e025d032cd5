//! Hand skeleton types
//!
//! Keypoints follow the 21-point hand convention: wrist first, then four
//! joints per finger from base to tip, thumb through pinky.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of keypoints in one hand skeleton
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// Fingertip indices, thumb first
pub const TIP_IDS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

#[derive(Error, Debug, PartialEq)]
pub enum SkeletonError {
    #[error("Expected 21 keypoints, got {0}")]
    WrongKeypointCount(usize),
    #[error("Keypoint {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// A single normalized 2D keypoint
///
/// Both coordinates are relative to the frame dimensions, nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Reflect across the vertical center line of the frame
    pub fn mirrored(self) -> Self {
        Self {
            x: 1.0 - self.x,
            y: self.y,
        }
    }
}

/// One detected hand: exactly 21 ordered keypoints
#[derive(Debug, Clone, PartialEq)]
pub struct HandSkeleton {
    keypoints: [Keypoint; LANDMARK_COUNT],
}

impl HandSkeleton {
    pub fn new(keypoints: [Keypoint; LANDMARK_COUNT]) -> Self {
        Self { keypoints }
    }

    /// Build a skeleton from detector output, validating count and values
    pub fn from_keypoints(keypoints: &[Keypoint]) -> Result<Self, SkeletonError> {
        let arr: [Keypoint; LANDMARK_COUNT] = keypoints
            .try_into()
            .map_err(|_| SkeletonError::WrongKeypointCount(keypoints.len()))?;

        if let Some(index) = arr
            .iter()
            .position(|k| !k.x.is_finite() || !k.y.is_finite())
        {
            return Err(SkeletonError::NonFinite { index });
        }

        Ok(Self { keypoints: arr })
    }

    pub fn keypoint(&self, index: usize) -> Keypoint {
        self.keypoints[index]
    }

    pub fn keypoints(&self) -> &[Keypoint; LANDMARK_COUNT] {
        &self.keypoints
    }

    pub fn mirrored(&self) -> Self {
        Self {
            keypoints: self.keypoints.map(Keypoint::mirrored),
        }
    }
}
