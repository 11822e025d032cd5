//! Virtual on/off button with edge-triggered touch detection

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gesture::CursorPoint;

/// Fixed screen rectangle of the virtual button, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ButtonRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Strictly inside: cursors on the border do not count
    pub fn contains(&self, cursor: CursorPoint) -> bool {
        self.x < cursor.x
            && cursor.x < self.x + self.width
            && self.y < cursor.y
            && cursor.y < self.y + self.height
    }
}

impl Default for ButtonRegion {
    fn default() -> Self {
        Self::new(50, 380, 150, 70)
    }
}

/// Debounce phase of the button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPhase {
    NotTouching,
    Touching,
}

/// Persistent button state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    /// Toggled output state
    pub on: bool,
    /// A cursor overlapped the region on the previous evaluation
    pub armed: bool,
}

impl ButtonState {
    pub fn phase(&self) -> TouchPhase {
        if self.armed {
            TouchPhase::Touching
        } else {
            TouchPhase::NotTouching
        }
    }
}

/// Turns per-frame touch samples into toggle events
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonTouchTracker {
    region: ButtonRegion,
}

impl ButtonTouchTracker {
    pub fn new(region: ButtonRegion) -> Self {
        Self { region }
    }

    pub fn region(&self) -> ButtonRegion {
        self.region
    }

    /// True if any of the frame's cursors is inside the region
    pub fn touched_by(&self, cursors: &[CursorPoint]) -> bool {
        cursors.iter().any(|&c| self.region.contains(c))
    }

    /// Advance the state machine by one sample
    ///
    /// Returns the new `on` value when the sample starts a touch, `None`
    /// otherwise.
    pub fn step(&self, state: &mut ButtonState, inside: bool) -> Option<bool> {
        match (state.phase(), inside) {
            (TouchPhase::NotTouching, true) => {
                state.on = !state.on;
                state.armed = true;
                debug!(on = state.on, "Button toggled");
                Some(state.on)
            }
            (TouchPhase::Touching, false) => {
                state.armed = false;
                None
            }
            (TouchPhase::Touching, true) | (TouchPhase::NotTouching, false) => None,
        }
    }

    /// Evaluate all cursors of one frame as a single sample
    pub fn step_frame(&self, state: &mut ButtonState, cursors: &[CursorPoint]) -> Option<bool> {
        self.step(state, self.touched_by(cursors))
    }
}
