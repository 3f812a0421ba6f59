use winit::keyboard::KeyCode;

/// Per-frame input accumulator: mouse deltas plus the movement key map.
/// Mouse and scroll deltas only accumulate while pointer lock is held.
#[derive(Debug, Default)]
pub struct InputState {
    pub dx: f32,
    pub dy: f32,
    pub dscroll: f32,
    pub up: bool,
    pub left: bool,
    pub down: bool,
    pub right: bool,
    pub pointer: bool,
}

impl InputState {
    pub fn press_key(&mut self, key: KeyCode) {
        self.set_key(key, true);
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.set_key(key, false);
    }

    fn set_key(&mut self, key: KeyCode, pressed: bool) {
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => self.up = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.left = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.down = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.right = pressed,
            _ => {}
        }
    }

    pub fn set_pointer_lock(&mut self, locked: bool) {
        self.pointer = locked;
        if !locked {
            self.dx = 0.0;
            self.dy = 0.0;
            self.dscroll = 0.0;
        }
    }

    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        if self.pointer {
            self.dx += dx;
            self.dy += dy;
        }
    }

    pub fn add_scroll_delta(&mut self, delta: f32) {
        if self.pointer {
            self.dscroll += delta;
        }
    }

    /// Hand the accumulated `(dx, dy, dscroll)` to the camera and reset for
    /// the next frame.
    pub fn take_frame_deltas(&mut self) -> (f32, f32, f32) {
        let deltas = (self.dx, self.dy, self.dscroll);
        self.dx = 0.0;
        self.dy = 0.0;
        self.dscroll = 0.0;
        deltas
    }
}
