//! Per-frame processing over explicit loop state

use tracing::debug;

use crate::button::{ButtonState, ButtonTouchTracker};
use crate::command::{CommandEncoder, SerialCommand};
use crate::gesture::{count_fingers, cursor_of, CursorPoint};
use crate::hand::HandSkeleton;

/// Most hands interpreted per frame; two hands span the `0`..`10` count range
pub const MAX_HANDS: usize = 2;

/// Detector output for one video frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Hands in detector order, at most [`MAX_HANDS`]
    hands: Vec<HandSkeleton>,
}

impl Frame {
    /// Keeps the first [`MAX_HANDS`] hands in the order given
    pub fn new(width: u32, height: u32, mut hands: Vec<HandSkeleton>) -> Self {
        if hands.len() > MAX_HANDS {
            debug!(detected = hands.len(), kept = MAX_HANDS, "Dropping extra hands");
            hands.truncate(MAX_HANDS);
        }
        Self {
            width,
            height,
            hands,
        }
    }

    /// Hands in detector order; no identity across frames
    pub fn hands(&self) -> &[HandSkeleton] {
        &self.hands
    }

    /// Flip horizontally so keypoints match a mirror view
    pub fn mirrored(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            hands: self.hands.iter().map(HandSkeleton::mirrored).collect(),
        }
    }
}

/// State that persists across frames for the life of the loop
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    pub button: ButtonState,
    pub encoder: CommandEncoder,
}

/// What one frame produced
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub total_fingers: u8,
    pub cursors: Vec<CursorPoint>,
    /// New button state if this frame started a touch
    pub toggled: Option<bool>,
    /// Commands to write, in order
    pub commands: Vec<SerialCommand>,
}

/// Extended fingers summed over every hand in the frame, within `0..=10`
pub fn total_finger_count(frame: &Frame) -> u8 {
    frame.hands.iter().map(|h| count_fingers(h).count()).sum()
}

/// Interpret one frame and decide what to send
///
/// The button is evaluated once per frame: it counts as touched when any
/// hand's cursor is inside the region. `state.encoder` is not updated here;
/// the caller marks each command sent after the write succeeds.
pub fn process_frame(
    state: &mut LoopState,
    tracker: &ButtonTouchTracker,
    frame: &Frame,
) -> FrameResult {
    let total_fingers = total_finger_count(frame);
    let cursors: Vec<CursorPoint> = frame
        .hands
        .iter()
        .map(|hand| cursor_of(hand, frame.width, frame.height))
        .collect();

    let toggled = tracker.step_frame(&mut state.button, &cursors);
    let commands = state.encoder.encode(toggled, total_fingers);

    debug!(
        hands = frame.hands.len(),
        fingers = total_fingers,
        commands = commands.len(),
        "Frame processed"
    );

    FrameResult {
        total_fingers,
        cursors,
        toggled,
        commands,
    }
}
