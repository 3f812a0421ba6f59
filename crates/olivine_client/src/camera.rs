use glam::{Mat4, Vec3};

const HEADING_PER_PIXEL: f32 = 0.066 * std::f32::consts::PI / 180.0;
const PITCH_EPSILON: f32 = 0.01;
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - PITCH_EPSILON;
/// Pointer-lock implementations occasionally report one-frame spikes; a
/// delta this large that also dwarfs the previous one is replaced by it.
const JERK_THRESHOLD: f32 = 400.0;
const JERK_RATIO: f32 = 4.0;
const MAX_ZOOM: i32 = 10;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    heading: f32,
    pitch: f32,
    zoom: i32,
    last_dx: f32,
    last_dy: f32,
    projection: Mat4,
}

impl Camera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            heading: 0.0,
            pitch: 0.0,
            zoom: 0,
            last_dx: 0.0,
            last_dy: 0.0,
            projection: Mat4::perspective_rh(fov, aspect.max(1e-4), near.max(1e-4), far),
        }
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    pub fn set_projection(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Mat4::perspective_rh(fov, aspect.max(1e-4), near.max(1e-4), far);
    }

    /// Apply one frame of input deltas.
    pub fn update(&mut self, dx: f32, dy: f32, dscroll: f32) {
        let (dx, dy) = self.smooth_deltas(dx, dy);

        self.heading += dx * HEADING_PER_PIXEL;
        while self.heading >= std::f32::consts::TAU {
            self.heading -= std::f32::consts::TAU;
        }
        while self.heading < 0.0 {
            self.heading += std::f32::consts::TAU;
        }

        self.pitch = (self.pitch + dy * HEADING_PER_PIXEL).clamp(-MAX_PITCH, MAX_PITCH);

        if dscroll != 0.0 {
            self.zoom = (self.zoom + dscroll.signum() as i32).clamp(0, MAX_ZOOM);
        }
    }

    fn smooth_deltas(&mut self, dx: f32, dy: f32) -> (f32, f32) {
        let jerk_x = dx.abs() > JERK_THRESHOLD && (dx / self.last_dx).abs() > JERK_RATIO;
        let jerk_y = dy.abs() > JERK_THRESHOLD && (dy / self.last_dy).abs() > JERK_RATIO;

        let out_x = if jerk_x { self.last_dx } else { dx };
        let out_y = if jerk_y { self.last_dy } else { dy };
        self.last_dx = if jerk_x { 0.5 * (self.last_dx + dx) } else { dx };
        self.last_dy = if jerk_y { 0.5 * (self.last_dy + dy) } else { dy };
        (out_x, out_y)
    }

    /// Unit view direction: +z pitched about x, then rotated about y by the
    /// heading.
    pub fn direction(&self) -> Vec3 {
        let (sin_h, cos_h) = self.heading.sin_cos();
        let (sin_p, cos_p) = self.pitch.sin_cos();
        Vec3::new(cos_p * sin_h, -sin_p, cos_p * cos_h)
    }

    pub fn transform(&self) -> Mat4 {
        self.transform_for(Vec3::ZERO)
    }

    /// View-projection with `offset` subtracted from the camera position,
    /// so per-mesh world offsets fold into the matrix instead of the
    /// vertices.
    pub fn transform_for(&self, offset: Vec3) -> Mat4 {
        let view = Mat4::look_to_rh(self.position - offset, self.direction(), Vec3::Y);
        self.projection * view
    }
}
