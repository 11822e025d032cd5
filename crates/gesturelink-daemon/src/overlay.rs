//! What the renderer draws on top of each frame

use gesturelink_core::{ButtonRegion, CursorPoint};
use serde::Serialize;

/// RGB fill for the button when on
pub const ON_COLOR: [u8; 3] = [0, 255, 0];
/// RGB fill for the button when off
pub const OFF_COLOR: [u8; 3] = [255, 0, 0];

#[derive(Debug, Clone, Serialize)]
pub struct ButtonOverlay<'a> {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub label: &'a str,
    pub on: bool,
    pub color: [u8; 3],
}

/// Overlay for one frame: the button, one cursor per hand, and the count sent
#[derive(Debug, Clone, Serialize)]
pub struct Overlay<'a> {
    pub button: ButtonOverlay<'a>,
    pub cursors: &'a [CursorPoint],
    pub sending: u8,
}

impl<'a> Overlay<'a> {
    pub fn new(
        label: &'a str,
        region: ButtonRegion,
        on: bool,
        cursors: &'a [CursorPoint],
        sending: u8,
    ) -> Self {
        Self {
            button: ButtonOverlay {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                label,
                on,
                color: if on { ON_COLOR } else { OFF_COLOR },
            },
            cursors,
            sending,
        }
    }
}
