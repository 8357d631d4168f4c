// SPDX-License-Identifier: MPL-2.0

//! Per-frame input state.
//!
//! Window-system callbacks feed events into an [`InputState`] owned by the render loop, which then
//! applies the accumulated state to a [`Camera`] once per frame.

use std::{collections::HashSet, time::Instant};

use crate::camera::{Camera, CameraMovement};

/// Measures the time between consecutive frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `now` and returns the seconds elapsed since the previous one.
    ///
    /// The first tick returns zero.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);

        delta
    }
}

#[derive(Clone, Debug)]
pub struct InputState {
    last_x: f32,
    last_y: f32,
    first_mouse: bool,
    held: HashSet<CameraMovement>,
    clock: FrameClock,
    delta_time: f32,
}

impl InputState {
    /// Creates input state for a window of the given size, with the cursor assumed centred.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            last_x: width as f32 / 2.0,
            last_y: height as f32 / 2.0,
            first_mouse: true,
            held: HashSet::new(),
            clock: FrameClock::new(),
            delta_time: 0.0,
        }
    }

    /// Records a cursor position and returns the offset from the previous one.
    ///
    /// The first position only seeds the tracker and yields a zero offset, so the camera does not
    /// jump when the cursor enters the window. The Y offset is reversed since window coordinates
    /// grow downwards.
    pub fn cursor_moved(&mut self, x: f32, y: f32) -> (f32, f32) {
        if self.first_mouse {
            self.last_x = x;
            self.last_y = y;
            self.first_mouse = false;
        }

        let offset = (x - self.last_x, self.last_y - y);
        self.last_x = x;
        self.last_y = y;

        offset
    }

    /// Forgets the last cursor position, e.g. after the cursor left the window.
    pub fn reset_cursor(&mut self) {
        self.first_mouse = true;
    }

    pub fn set_key(&mut self, movement: CameraMovement, pressed: bool) {
        if pressed {
            self.held.insert(movement);
        } else {
            self.held.remove(&movement);
        }
    }

    pub fn is_held(&self, movement: CameraMovement) -> bool {
        self.held.contains(&movement)
    }

    /// Seconds elapsed between the last two calls to [`begin_frame`](Self::begin_frame).
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Advances the frame clock and returns the new delta time.
    pub fn begin_frame(&mut self, now: Instant) -> f32 {
        self.delta_time = self.clock.tick(now);

        self.delta_time
    }

    /// Applies held movement keys to `camera` for the current delta time.
    pub fn update(&self, camera: &mut Camera) {
        for movement in [
            CameraMovement::Forward,
            CameraMovement::Backward,
            CameraMovement::Left,
            CameraMovement::Right,
        ] {
            if self.is_held(movement) {
                camera.process_keyboard(movement, self.delta_time);
            }
        }
    }
}

/// Feeds a cursor position through `input` and rotates `camera` by the resulting offset.
pub fn handle_cursor(input: &mut InputState, camera: &mut Camera, x: f32, y: f32) {
    let (x_offset, y_offset) = input.cursor_moved(x, y);
    camera.process_mouse_movement(x_offset, y_offset, true);
}
