//! Finger counting and cursor projection
//!
//! The counting heuristic is deliberately approximate. The thumb test compares
//! horizontal positions and assumes a front-facing, mirrored camera view with
//! the palm toward the camera; a back-facing hand inverts the thumb result.

use serde::{Deserialize, Serialize};

use crate::hand::{HandSkeleton, INDEX_TIP, TIP_IDS};

/// Extended state of each finger: thumb, index, middle, ring, pinky
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerMask(pub [bool; 5]);

impl FingerMask {
    pub fn count(&self) -> u8 {
        self.0.iter().filter(|&&up| up).count() as u8
    }

    pub fn thumb(&self) -> bool {
        self.0[0]
    }
}

/// Pixel-space position of an index fingertip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPoint {
    pub x: i32,
    pub y: i32,
}

/// Decide which fingers of one hand are extended
pub fn count_fingers(hand: &HandSkeleton) -> FingerMask {
    let mut mask = [false; 5];

    let thumb_tip = hand.keypoint(TIP_IDS[0]);
    let thumb_ip = hand.keypoint(TIP_IDS[0] - 1);
    mask[0] = thumb_tip.x < thumb_ip.x;

    for finger in 1..5 {
        let tip = hand.keypoint(TIP_IDS[finger]);
        let pip = hand.keypoint(TIP_IDS[finger] - 2);
        mask[finger] = tip.y < pip.y;
    }

    FingerMask(mask)
}

/// Project the index fingertip into pixel space
pub fn cursor_of(hand: &HandSkeleton, frame_width: u32, frame_height: u32) -> CursorPoint {
    let tip = hand.keypoint(INDEX_TIP);
    CursorPoint {
        x: (tip.x * frame_width as f32).round() as i32,
        y: (tip.y * frame_height as f32).round() as i32,
    }
}
