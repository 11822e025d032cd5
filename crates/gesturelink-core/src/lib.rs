//! GestureLink Core - Gesture interpretation and command encoding
//!
//! This crate holds the per-frame decision logic of the GestureLink system:
//! - Hand skeleton types produced by an external pose estimator
//! - Finger counting and cursor projection
//! - Edge-triggered virtual button tracking
//! - The serial command alphabet and change-detection policy
//! - A per-frame processing function over explicit loop state

pub mod button;
pub mod command;
pub mod frame;
pub mod gesture;
pub mod hand;

pub use button::{ButtonRegion, ButtonState, ButtonTouchTracker, TouchPhase};
pub use command::{CommandEncoder, SerialCommand, MAX_FINGER_COUNT};
pub use frame::{process_frame, total_finger_count, Frame, FrameResult, LoopState, MAX_HANDS};
pub use gesture::{count_fingers, cursor_of, CursorPoint, FingerMask};
pub use hand::{HandSkeleton, Keypoint, SkeletonError, LANDMARK_COUNT};
