//! Helicopter flight model and its eight rigid parts.
//!
//! Controls are integrated into position and Euler angles every frame. Pitch
//! and roll level out on their own; yaw does not. The rotors spin at a fixed
//! rate and are the only parts with a time-varying local transform.

use engine_core::{euler_rotation, rotate_about_pivot};
use glam::{Mat4, Vec3};
use input::{ControlAction, ControlState};
use renderer::{load_models, Model};
use std::f32::consts::FRAC_PI_4;
use std::ops::Index;
use std::path::Path;
use thiserror::Error;

/// Horizontal drift speed per unit of tilt.
pub const VELOCITY: f32 = 10.0;
/// Climb speed at full throttle.
pub const LIFT: f32 = 3.0;
/// Where the helicopter starts.
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 5.5, 0.0);
/// Rotor spin rate in radians per second.
pub const ROTOR_SPEED: f32 = 0.5 * std::f32::consts::PI;
/// Time constant of the pitch/roll auto-level.
pub const LEVEL_TIME_CONSTANT: f32 = FRAC_PI_4;
pub const MAIN_ROTOR_PIVOT: Vec3 = Vec3::new(0.0, 0.0, -0.69129);
pub const TAIL_ROTOR_PIVOT: Vec3 = Vec3::new(-0.28062, 1.813, -8.009);

/// One rigid part of the helicopter model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    Body,
    Rotor,
    Slides,
    TailRotor,
    Windows,
    Strobe,
    Spotlight,
    Lights,
}

impl Part {
    pub const COUNT: usize = 8;

    pub const ALL: [Part; Self::COUNT] = [
        Part::Body,
        Part::Rotor,
        Part::Slides,
        Part::TailRotor,
        Part::Windows,
        Part::Strobe,
        Part::Spotlight,
        Part::Lights,
    ];

    /// Object name of this part in the model file.
    pub fn name(self) -> &'static str {
        match self {
            Part::Body => "helicopter_body",
            Part::Rotor => "main_rotor",
            Part::Slides => "slides",
            Part::TailRotor => "tail_rotor_tail",
            Part::Windows => "windows",
            Part::Strobe => "strobe",
            Part::Spotlight => "spotlight",
            Part::Lights => "lights",
        }
    }

    pub fn from_name(name: &str) -> Option<Part> {
        Self::ALL.into_iter().find(|part| part.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartError {
    #[error("expected {expected} helicopter parts, found {found}")]
    CountMismatch { expected: usize, found: usize },
    #[error("unknown helicopter part '{0}'")]
    UnknownPart(String),
    #[error("helicopter part '{0}' appears more than once")]
    DuplicatePart(&'static str),
    #[error("helicopter part '{0}' is missing")]
    MissingPart(&'static str),
}

/// Exactly one `T` per [`Part`], indexed by part.
#[derive(Debug)]
pub struct PartSet<T> {
    parts: [T; Part::COUNT],
}

impl<T> PartSet<T> {
    /// Assign named values to their parts, in any order. Every part must be
    /// named exactly once and no other names may appear.
    pub fn from_named(named: Vec<(String, T)>) -> Result<Self, PartError> {
        if named.len() != Part::COUNT {
            return Err(PartError::CountMismatch {
                expected: Part::COUNT,
                found: named.len(),
            });
        }

        let mut slots: [Option<T>; Part::COUNT] = Default::default();
        for (name, value) in named {
            let part = Part::from_name(&name).ok_or(PartError::UnknownPart(name))?;
            let slot = &mut slots[part.index()];
            if slot.is_some() {
                return Err(PartError::DuplicatePart(part.name()));
            }
            *slot = Some(value);
        }

        let mut parts = Vec::with_capacity(Part::COUNT);
        for part in Part::ALL {
            let value = slots[part.index()].take().ok_or(PartError::MissingPart(part.name()))?;
            parts.push(value);
        }
        let parts = parts.try_into().map_err(|rest: Vec<T>| PartError::CountMismatch {
            expected: Part::COUNT,
            found: rest.len(),
        })?;
        Ok(Self { parts })
    }

    pub fn get(&self, part: Part) -> &T {
        &self.parts[part.index()]
    }

    /// Parts paired with their values, in [`Part::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Part, &T)> {
        Part::ALL.into_iter().zip(self.parts.iter())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PartSet<U> {
        PartSet { parts: self.parts.map(f) }
    }
}

impl<T> Index<Part> for PartSet<T> {
    type Output = T;

    fn index(&self, part: Part) -> &T {
        self.get(part)
    }
}

/// Signed control axes, each in {-1, 0, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlAxes {
    pub throttle: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl ControlAxes {
    pub fn from_controls(controls: &ControlState) -> Self {
        Self {
            throttle: controls.axis(ControlAction::ThrottleUp, ControlAction::ThrottleDown),
            yaw: controls.axis(ControlAction::YawLeft, ControlAction::YawRight),
            pitch: controls.axis(ControlAction::PitchDown, ControlAction::PitchUp),
            roll: controls.axis(ControlAction::RollRight, ControlAction::RollLeft),
        }
    }
}

/// Position, attitude and rotor state of the helicopter.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightModel {
    pub position: Vec3,
    /// x = pitch, y = yaw, z = roll, in radians.
    pub angles: Vec3,
    pub rotor_angle: f32,
    pub velocity: f32,
    pub lift: f32,
    rotation: Mat4,
    transform: Mat4,
    main_rotor: Mat4,
    tail_rotor: Mat4,
}

impl Default for FlightModel {
    fn default() -> Self {
        Self::new(SPAWN_POSITION)
    }
}

impl FlightModel {
    pub fn new(position: Vec3) -> Self {
        Self::with_angles(position, Vec3::ZERO)
    }

    pub fn with_angles(position: Vec3, angles: Vec3) -> Self {
        let rotation = euler_rotation(angles);
        Self {
            position,
            angles,
            rotor_angle: 0.0,
            velocity: VELOCITY,
            lift: LIFT,
            rotation,
            transform: Mat4::from_translation(position) * rotation,
            main_rotor: Mat4::IDENTITY,
            tail_rotor: Mat4::IDENTITY,
        }
    }

    /// Integrate one step of `dt` seconds.
    ///
    /// Lift and drift use the attitude from the previous step. Tilt always
    /// produces horizontal drift, with or without throttle.
    pub fn advance(&mut self, controls: &ControlState, dt: f32) {
        let axes = ControlAxes::from_controls(controls);

        let up = self.rotation.col(1).truncate();
        let lift = up.normalize_or_zero() * (axes.throttle * self.lift);
        let drift = Vec3::new(up.x, 0.0, up.z) * self.velocity;
        self.position += dt * lift + dt * drift;

        self.angles.x += dt * axes.pitch - dt * self.angles.x / LEVEL_TIME_CONSTANT;
        self.angles.y += dt * axes.yaw;
        self.angles.z += dt * axes.roll - dt * self.angles.z / LEVEL_TIME_CONSTANT;

        self.rotation = euler_rotation(self.angles);
        self.transform = Mat4::from_translation(self.position) * self.rotation;

        self.rotor_angle += dt * ROTOR_SPEED;
        self.main_rotor = rotate_about_pivot(MAIN_ROTOR_PIVOT, Mat4::from_rotation_y(self.rotor_angle));
        self.tail_rotor = rotate_about_pivot(TAIL_ROTOR_PIVOT, Mat4::from_rotation_x(self.rotor_angle));
    }

    /// `translate(position) * Ry(yaw) * Rx(pitch) * Rz(roll)` as of the last step.
    pub fn root_transform(&self) -> Mat4 {
        self.transform
    }

    /// Transform of a part relative to the helicopter root.
    pub fn local_transform(&self, part: Part) -> Mat4 {
        match part {
            Part::Rotor => self.main_rotor,
            Part::TailRotor => self.tail_rotor,
            _ => Mat4::IDENTITY,
        }
    }

    /// World transform of a part: root * local.
    pub fn part_transform(&self, part: Part) -> Mat4 {
        self.transform * self.local_transform(part)
    }
}

/// The flight model together with its uploaded part meshes.
pub struct Helicopter {
    pub flight: FlightModel,
    pub parts: PartSet<Model>,
}

impl Helicopter {
    /// Load the part meshes from an OBJ file. The file must contain exactly
    /// the eight named parts.
    pub fn load(device: &wgpu::Device, path: &Path) -> anyhow::Result<Self> {
        let models = load_models(path)?;
        let named = models.into_iter().map(|data| (data.name.clone(), data)).collect();
        let parts = PartSet::from_named(named)?.map(|data| Model::upload(device, data));
        log::info!(
            "Helicopter loaded: {} parts, {} materials",
            Part::COUNT,
            parts.iter().map(|(_, model)| model.materials.len()).sum::<usize>()
        );
        Ok(Self {
            flight: FlightModel::default(),
            parts,
        })
    }

    pub fn update(&mut self, controls: &ControlState, dt: f32) {
        self.flight.advance(controls, dt);
    }

    pub fn position(&self) -> Vec3 {
        self.flight.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn all_names() -> Vec<(String, usize)> {
        Part::ALL.iter().enumerate().map(|(i, p)| (p.name().to_string(), i)).collect()
    }

    #[test]
    fn axes_are_signed_differences_for_every_flag_combination() {
        for bits in 0u16..256 {
            let held: Vec<_> = ControlAction::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| bits & (1 << i) != 0)
                .map(|(_, a)| *a)
                .collect();
            let controls = ControlState::with_held(&held);
            let axes = ControlAxes::from_controls(&controls);
            let flag = |a| f32::from(u8::from(controls.is_held(a)));

            assert_eq!(axes.throttle, flag(ControlAction::ThrottleUp) - flag(ControlAction::ThrottleDown));
            assert_eq!(axes.yaw, flag(ControlAction::YawLeft) - flag(ControlAction::YawRight));
            assert_eq!(axes.pitch, flag(ControlAction::PitchDown) - flag(ControlAction::PitchUp));
            assert_eq!(axes.roll, flag(ControlAction::RollRight) - flag(ControlAction::RollLeft));
            for v in [axes.throttle, axes.yaw, axes.pitch, axes.roll] {
                assert!(v == -1.0 || v == 0.0 || v == 1.0);
            }
        }
    }

    #[test]
    fn zero_dt_changes_nothing() {
        let controls = ControlState::with_held(&ControlAction::ALL);
        let mut heli = FlightModel::with_angles(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.2, -0.4, 0.1));
        let before = heli.clone();
        heli.advance(&controls, 0.0);
        assert_eq!(heli.position, before.position);
        assert_eq!(heli.angles, before.angles);
        assert_eq!(heli.rotor_angle, before.rotor_angle);
    }

    #[test]
    fn pitch_and_roll_decay_without_input() {
        let controls = ControlState::new();
        let mut heli = FlightModel::with_angles(SPAWN_POSITION, Vec3::new(0.5, 0.3, -0.4));
        for _ in 0..300 {
            let (pitch, roll) = (heli.angles.x, heli.angles.z);
            heli.advance(&controls, DT);
            assert!(heli.angles.x.abs() < pitch.abs());
            assert!(heli.angles.z.abs() < roll.abs());
        }
        // Yaw has no decay.
        assert_eq!(heli.angles.y, 0.3);
        assert!(heli.angles.x.abs() < 0.01);
    }

    #[test]
    fn rotors_spin_by_fixed_increment_regardless_of_throttle() {
        for held in [&[ControlAction::ThrottleUp][..], &[ControlAction::ThrottleDown], &[]] {
            let controls = ControlState::with_held(held);
            let mut heli = FlightModel::default();
            for _ in 0..10 {
                let before = heli.rotor_angle;
                heli.advance(&controls, DT);
                assert!(heli.rotor_angle > before);
                assert!((heli.rotor_angle - before - DT * 0.5 * std::f32::consts::PI).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn rotor_parts_rotate_about_their_pivots() {
        let mut heli = FlightModel::default();
        heli.advance(&ControlState::new(), 0.7);
        let main = heli.local_transform(Part::Rotor);
        let tail = heli.local_transform(Part::TailRotor);
        assert!(main.transform_point3(MAIN_ROTOR_PIVOT).abs_diff_eq(MAIN_ROTOR_PIVOT, 1e-5));
        assert!(tail.transform_point3(TAIL_ROTOR_PIVOT).abs_diff_eq(TAIL_ROTOR_PIVOT, 1e-5));
        // Main rotor turns about Y, tail rotor about X.
        assert!((main.transform_vector3(Vec3::Y) - Vec3::Y).length() < 1e-5);
        assert!((tail.transform_vector3(Vec3::X) - Vec3::X).length() < 1e-5);
        assert_eq!(heli.local_transform(Part::Body), Mat4::IDENTITY);
        assert!(heli
            .part_transform(Part::Rotor)
            .abs_diff_eq(heli.root_transform() * main, 1e-6));
    }

    #[test]
    fn root_transform_decomposes_into_translation_and_euler_rotation() {
        let cases = [
            (Vec3::new(1.0, 5.5, -3.0), Vec3::new(0.3, 1.2, -0.2)),
            (Vec3::ZERO, Vec3::new(-0.7, -2.5, 0.9)),
            (Vec3::new(-10.0, 0.0, 4.0), Vec3::ZERO),
        ];
        for (position, angles) in cases {
            let heli = FlightModel::with_angles(position, angles);
            let expected = Mat4::from_translation(position)
                * Mat4::from_rotation_y(angles.y)
                * Mat4::from_rotation_x(angles.x)
                * Mat4::from_rotation_z(angles.z);
            assert!(heli.root_transform().abs_diff_eq(expected, 1e-5));

            let (_, rotation, translation) = heli.root_transform().to_scale_rotation_translation();
            assert!(translation.abs_diff_eq(position, 1e-5));
            let (y, x, z) = rotation.to_euler(glam::EulerRot::YXZ);
            let back = Mat4::from_rotation_y(y) * Mat4::from_rotation_x(x) * Mat4::from_rotation_z(z);
            assert!(back.abs_diff_eq(euler_rotation(angles), 1e-4));
        }
    }

    #[test]
    fn tilt_drifts_even_without_throttle() {
        let mut heli = FlightModel::with_angles(SPAWN_POSITION, Vec3::new(0.0, 0.0, 0.3));
        heli.advance(&ControlState::new(), DT);
        assert!((heli.position.x - SPAWN_POSITION.x).abs() > 1e-3);
    }

    #[test]
    fn throttle_climbs_when_level() {
        let mut heli = FlightModel::default();
        heli.advance(&ControlState::with_held(&[ControlAction::ThrottleUp]), 1.0);
        assert!(heli.position.abs_diff_eq(SPAWN_POSITION + Vec3::Y * LIFT, 1e-5));
    }

    #[test]
    fn idle_hover_for_ten_seconds_stays_put_and_level() {
        let controls = ControlState::new();
        let mut heli = FlightModel::default();
        for _ in 0..600 {
            heli.advance(&controls, DT);
        }
        assert!(heli.position.y - SPAWN_POSITION.y < 1e-5);
        assert!(heli.position.abs_diff_eq(SPAWN_POSITION, 1e-5));
        assert!(heli.angles.x.abs() < 1e-5);
        assert!(heli.angles.z.abs() < 1e-5);
    }

    #[test]
    fn parts_are_assigned_by_name_in_any_order() {
        let mut named = all_names();
        named.reverse();
        named.swap(2, 5);
        let set = PartSet::from_named(named).unwrap();
        for (i, part) in Part::ALL.iter().enumerate() {
            assert_eq!(set[*part], i);
        }
    }

    #[test]
    fn missing_part_fails_to_load() {
        let mut named = all_names();
        named.remove(3);
        assert_eq!(
            PartSet::from_named(named).unwrap_err(),
            PartError::CountMismatch { expected: 8, found: 7 }
        );
    }

    #[test]
    fn unknown_and_duplicate_parts_fail_to_load() {
        let mut named = all_names();
        named[4].0 = "propeller".into();
        assert_eq!(
            PartSet::from_named(named).unwrap_err(),
            PartError::UnknownPart("propeller".into())
        );

        let mut named = all_names();
        named[7].0 = "slides".into();
        assert_eq!(PartSet::from_named(named).unwrap_err(), PartError::DuplicatePart("slides"));
    }

    #[test]
    fn part_names_round_trip() {
        for part in Part::ALL {
            assert_eq!(Part::from_name(part.name()), Some(part));
        }
        assert_eq!(Part::from_name("helicopter"), None);
    }
}
