//! Scene state: camera rig, helicopter and ground, updated once per frame.

use crate::config::GameConfig;
use crate::helicopter::Helicopter;
use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3};
use input::{Command, ControlState};
use renderer::{load_models, Camera, DrawItem, Model};

/// Uniform scale applied to the ground mesh.
pub const GROUND_SCALE: f32 = 4.0;
/// Specular intensity for ground materials.
pub const GROUND_SPECULAR: f32 = 0.7;

pub const CAMERA_FOV_DEGREES: f32 = 45.0;
pub const CAMERA_NEAR: f32 = 0.01;
pub const CAMERA_FAR: f32 = 500.0;
pub const CAMERA_START: Vec3 = Vec3::new(10.0, 10.0, 10.0);

/// Orbit camera plus the follow/zoom behaviour driven by input.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub camera: Camera,
    /// Keep the orbit target on the helicopter.
    pub follow: bool,
    pub zoom_speed_multiplier: f32,
}

impl CameraRig {
    pub fn new(width: u32, height: u32, config: &GameConfig) -> Self {
        let mut camera = Camera::new(
            width,
            height,
            CAMERA_FOV_DEGREES.to_radians(),
            CAMERA_NEAR,
            CAMERA_FAR,
            CAMERA_START,
            Vec3::ZERO,
        );
        camera.sensitivity = config.orbit_sensitivity;
        Self {
            camera,
            follow: true,
            zoom_speed_multiplier: config.zoom_speed_multiplier,
        }
    }

    /// Apply a camera command. Other commands are ignored.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::ResetOrbit => {
                self.follow = false;
                self.camera.follow(Vec3::ZERO);
            }
            Command::FreeOrbit => self.follow = false,
            Command::FollowHelicopter => self.follow = true,
            Command::Screenshot | Command::Quit => return,
        }
        log::debug!("Camera follow: {}", self.follow);
    }

    /// Mouse drag delta in pixels (previous minus current).
    pub fn orbit(&mut self, delta: Vec2) {
        self.camera.update_orbit(delta, 0.0);
    }

    /// Wheel movement in lines.
    pub fn zoom(&mut self, lines: f32) {
        self.camera.update_orbit(Vec2::ZERO, self.zoom_speed_multiplier * lines);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
    }

    /// Track the helicopter when following.
    pub fn update(&mut self, target: Vec3) {
        if self.follow {
            self.camera.follow(target);
        }
    }
}

/// Everything drawn and updated each frame.
pub struct SceneState {
    pub rig: CameraRig,
    pub helicopter: Helicopter,
    pub ground: Model,
}

impl SceneState {
    pub fn load(device: &wgpu::Device, width: u32, height: u32, config: &GameConfig) -> Result<Self> {
        let helicopter = Helicopter::load(device, &config.helicopter_model)
            .with_context(|| format!("Failed to load helicopter from {:?}", config.helicopter_model))?;

        let ground_data = load_models(&config.ground_model)
            .with_context(|| format!("Failed to load ground from {:?}", config.ground_model))?
            .into_iter()
            .next()
            .with_context(|| format!("No ground mesh in {:?}", config.ground_model))?;
        let ground = Model::upload(device, ground_data).with_fallback_specular(GROUND_SPECULAR);

        Ok(Self {
            rig: CameraRig::new(width, height, config),
            helicopter,
            ground,
        })
    }

    pub fn update(&mut self, controls: &ControlState, dt: f32) {
        self.helicopter.update(controls, dt);
        self.rig.update(self.helicopter.position());
    }

    /// Helicopter parts in part order, then the ground.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let flight = &self.helicopter.flight;
        let mut items: Vec<DrawItem<'_>> = self
            .helicopter
            .parts
            .iter()
            .map(|(part, model)| DrawItem {
                model,
                transform: flight.part_transform(part),
            })
            .collect();
        items.push(DrawItem {
            model: &self.ground,
            transform: Mat4::from_scale(Vec3::splat(GROUND_SCALE)),
        });
        items
    }

    pub fn camera(&self) -> &Camera {
        &self.rig.camera
    }
}
