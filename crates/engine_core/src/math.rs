//! Rotation helpers for rigid-body part transforms.

use glam::{Mat4, Vec3};

/// Rotation matrix from Euler angles in radians, applied as
/// `Ry(angles.y) * Rx(angles.x) * Rz(angles.z)` (yaw, then pitch, then roll in local space).
pub fn euler_rotation(angles: Vec3) -> Mat4 {
    Mat4::from_rotation_y(angles.y) * Mat4::from_rotation_x(angles.x) * Mat4::from_rotation_z(angles.z)
}

/// Apply `rotation` around `pivot` instead of the origin: `T(pivot) * rotation * T(-pivot)`.
pub fn rotate_about_pivot(pivot: Vec3, rotation: Mat4) -> Mat4 {
    Mat4::from_translation(pivot) * rotation * Mat4::from_translation(-pivot)
}
