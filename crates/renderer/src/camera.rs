//! Orbit camera that circles a look-at target.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::PI;

/// Keeps the orbit away from the poles so `look_at_rh` never sees a parallel up vector.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Orbit camera parameterized by a look-at target plus yaw, pitch and distance.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Point the camera orbits and looks at.
    pub look_at: Vec3,
    /// Vertical field of view in radians, always inside (0, PI).
    fov: f32,
    /// Near clipping plane.
    near: f32,
    /// Far clipping plane, always greater than `near`.
    far: f32,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Radians of orbit per pixel of mouse drag.
    pub sensitivity: f32,
    /// Rotation around the world Y axis in radians.
    yaw: f32,
    /// Elevation above the XZ plane in radians.
    pitch: f32,
    /// Distance from the look-at target.
    distance: f32,
}

impl Camera {
    /// Create a camera at `position` looking at `look_at`.
    ///
    /// The field of view is clamped into (0, PI) and the far plane is pushed
    /// beyond the near plane if needed.
    pub fn new(width: u32, height: u32, fov: f32, near: f32, far: f32, position: Vec3, look_at: Vec3) -> Self {
        let near = near.max(f32::EPSILON);
        let far = if far > near { far } else { near * 2.0 };
        let mut camera = Self {
            look_at,
            fov: fov.clamp(0.01, PI - 0.01),
            near,
            far,
            width,
            height,
            sensitivity: 0.01,
            yaw: 0.0,
            pitch: 0.0,
            distance: 1.0,
        };
        camera.set_position(position);
        camera
    }

    /// Move the camera to `position`, keeping the current look-at target.
    pub fn set_position(&mut self, position: Vec3) {
        let offset = position - self.look_at;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }
        self.distance = distance.clamp(self.min_distance(), self.max_distance());
        self.pitch = (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
        self.yaw = offset.x.atan2(offset.z);
    }

    /// Orbit by a mouse drag delta (pixels) and zoom by `zoom`.
    ///
    /// Positive zoom moves the camera toward the target by that fraction of the current distance.
    pub fn update_orbit(&mut self, delta: Vec2, zoom: f32) {
        self.yaw += delta.x * self.sensitivity;
        self.pitch = (self.pitch - delta.y * self.sensitivity).clamp(-MAX_PITCH, MAX_PITCH);
        let scale = (1.0 - zoom).max(0.05);
        self.distance = (self.distance * scale).clamp(self.min_distance(), self.max_distance());
    }

    /// Keep orbiting, but around `target`.
    pub fn follow(&mut self, target: Vec3) {
        self.look_at = target;
    }

    /// Update the viewport (call on window resize).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.look_at + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.look_at, Vec3::Y)
    }

    /// Get the projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect(), self.near, self.far)
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    fn min_distance(&self) -> f32 {
        self.near * 2.0
    }

    fn max_distance(&self) -> f32 {
        (self.far * 0.5).max(self.min_distance())
    }
}

/// Camera uniform data for GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            proj: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    pub fn update(&mut self, camera: &Camera) {
        self.proj = camera.projection_matrix().to_cols_array_2d();
        self.view = camera.view_matrix().to_cols_array_2d();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}
