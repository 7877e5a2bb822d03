//! Core engine types and utilities for the helicopter demo.
//!
//! This crate provides the foundational pieces shared by the other crates:
//! - Frame timing for the variable-step main loop
//! - Rotation helpers used to compose rigid part transforms

pub mod math;
pub mod time;

pub use math::*;
pub use time::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
