//! Input handling: helicopter control flags, one-shot commands and orbit gestures.

use glam::Vec2;

/// Continuous helicopter controls. Each one is held while its key is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    PitchDown,
    PitchUp,
    YawLeft,
    YawRight,
    RollLeft,
    RollRight,
    ThrottleUp,
    ThrottleDown,
}

impl ControlAction {
    /// Number of control actions.
    pub const COUNT: usize = 8;

    /// Every action, in index order.
    pub const ALL: [ControlAction; Self::COUNT] = [
        ControlAction::PitchDown,
        ControlAction::PitchUp,
        ControlAction::YawLeft,
        ControlAction::YawRight,
        ControlAction::RollLeft,
        ControlAction::RollRight,
        ControlAction::ThrottleUp,
        ControlAction::ThrottleDown,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Held/not-held flag for every [`ControlAction`].
///
/// Written by the event handler, read once per frame by the flight model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    held: [bool; ControlAction::COUNT],
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state with exactly the given actions held.
    pub fn with_held(actions: &[ControlAction]) -> Self {
        let mut state = Self::default();
        for &action in actions {
            state.set(action, true);
        }
        state
    }

    /// Set whether an action is held.
    pub fn set(&mut self, action: ControlAction, held: bool) {
        self.held[action.index()] = held;
    }

    /// Check if an action is held.
    pub fn is_held(&self, action: ControlAction) -> bool {
        self.held[action.index()]
    }

    /// Signed axis from a pair of opposing actions: +1 when only `positive`
    /// is held, -1 when only `negative` is held, 0 otherwise.
    pub fn axis(&self, positive: ControlAction, negative: ControlAction) -> f32 {
        f32::from(u8::from(self.is_held(positive))) - f32::from(u8::from(self.is_held(negative)))
    }

    /// Release every action.
    pub fn clear(&mut self) {
        self.held = [false; ControlAction::COUNT];
    }
}

/// One-shot commands triggered on the initial key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop following, move the orbit target back to the world origin.
    ResetOrbit,
    /// Stop following the helicopter, keep the current orbit.
    FreeOrbit,
    /// Keep the orbit target on the helicopter.
    FollowHelicopter,
    /// Save the next frame as an image.
    Screenshot,
    /// Close the window.
    Quit,
}

/// Key bound to a continuous control, if any.
pub fn control_for_key(key: KeyCode) -> Option<ControlAction> {
    match key {
        KeyCode::KeyW => Some(ControlAction::PitchDown),
        KeyCode::KeyS => Some(ControlAction::PitchUp),
        KeyCode::KeyA => Some(ControlAction::RollLeft),
        KeyCode::KeyD => Some(ControlAction::RollRight),
        KeyCode::KeyQ => Some(ControlAction::YawLeft),
        KeyCode::KeyE => Some(ControlAction::YawRight),
        KeyCode::ShiftLeft => Some(ControlAction::ThrottleUp),
        KeyCode::Space => Some(ControlAction::ThrottleDown),
        _ => None,
    }
}

/// Key bound to a one-shot command, if any.
pub fn command_for_key(key: KeyCode) -> Option<Command> {
    match key {
        KeyCode::Digit0 => Some(Command::ResetOrbit),
        KeyCode::Digit1 => Some(Command::FreeOrbit),
        KeyCode::Digit2 => Some(Command::FollowHelicopter),
        KeyCode::KeyP => Some(Command::Screenshot),
        KeyCode::Escape => Some(Command::Quit),
        _ => None,
    }
}

/// Manages input state between frames.
#[derive(Debug, Default)]
pub struct InputState {
    /// Helicopter control flags.
    controls: ControlState,
    /// Whether the orbit (left) mouse button is held.
    orbit_held: bool,
    /// Last cursor position in window coordinates.
    mouse_position: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a keyboard event.
    ///
    /// Control keys are held on press and on auto-repeat and released on key up.
    /// Returns a command only for the initial press of a command key.
    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState, repeat: bool) -> Option<Command> {
        if let Some(action) = control_for_key(key) {
            self.controls.set(action, state.is_pressed());
        }

        if !state.is_pressed() || repeat {
            return None;
        }
        let command = command_for_key(key);
        if let Some(command) = command {
            log::debug!("{:?} -> {:?}", key, command);
        }
        command
    }

    /// Process a mouse button event. Pressing the left button starts an orbit
    /// drag anchored at the current cursor position.
    pub fn process_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.orbit_held = state.is_pressed();
        }
    }

    /// Process cursor position update.
    ///
    /// While the orbit button is held, returns the orbit delta
    /// (previous position minus current position).
    pub fn process_cursor_position(&mut self, position: (f64, f64)) -> Option<Vec2> {
        let position = Vec2::new(position.0 as f32, position.1 as f32);
        let previous = std::mem::replace(&mut self.mouse_position, position);
        if self.orbit_held {
            Some(previous - position)
        } else {
            None
        }
    }

    /// Convert a wheel event into scroll lines (positive = away from the user).
    pub fn process_scroll(&self, delta: MouseScrollDelta) -> f32 {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
        }
    }

    /// Drop every held control (e.g. when the window loses focus).
    pub fn release_all(&mut self) {
        self.controls.clear();
        self.orbit_held = false;
    }

    /// Current helicopter controls.
    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    /// Check if an orbit drag is in progress.
    pub fn is_orbiting(&self) -> bool {
        self.orbit_held
    }
}

/// Pixel-precise touchpads report pixels; treat this many as one wheel notch.
const PIXELS_PER_LINE: f64 = 20.0;

// Re-export for convenience
pub use winit::event::{ElementState, MouseButton, MouseScrollDelta};
pub use winit::keyboard::KeyCode;
